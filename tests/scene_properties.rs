use slotbatch::{
    model::MeshData,
    rendering::{
        backend::PrimitiveTopology,
        config::RenderConfig,
        error::BatchError,
        object_registry::ObjectId,
        recording_backend::RecordingBackend,
        scene::RenderScene,
        slot_table::SlotRange,
    },
};

fn scene(binding_stride: u32) -> RenderScene<RecordingBackend> {
    RenderScene::new(
        RecordingBackend::new(),
        &RenderConfig {
            binding_stride,
            ..Default::default()
        },
    )
}

fn mesh(vertex_count: u32, index_count: u32, seed: f32) -> MeshData {
    let vertices = (0..vertex_count * 6).map(|i| seed + i as f32).collect();
    let indices = (0..index_count).map(|i| (i * 7) % vertex_count).collect();

    MeshData::new(vertices, 6, indices, PrimitiveTopology::TriangleList)
}

fn occupied_slots(scene: &RenderScene<RecordingBackend>) -> Vec<u32> {
    let mut slots: Vec<_> = scene.registry().slot_table().occupied_slots().collect();
    slots.sort_unstable();
    slots
}

#[test]
fn test_slots_stay_dense_across_creates_and_destroys() {
    let mut scene = scene(2);
    let mut live: Vec<ObjectId> = Vec::new();

    for (step, count) in [3, 1, 2, 5, 1, 4, 2].into_iter().enumerate() {
        live.push(scene.create_object(&mesh(3, 3, 0.0), count).unwrap());

        if step % 2 == 1 {
            let victim = live.remove(step % live.len());
            scene.destroy_object(victim).unwrap();
        }

        let total = scene.registry().instance_count();
        assert_eq!(occupied_slots(&scene), (0..total).collect::<Vec<_>>());

        let expected_offsets: Vec<_> = (0..total).map(|slot| slot * 2).collect();
        assert_eq!(scene.backend().live_offsets(), expected_offsets);
    }
}

#[test]
fn test_destroying_middle_object_relocates_later_state() {
    let k = 2;
    let mut scene = scene(k);
    let a = scene.create_object(&mesh(3, 3, 0.0), 2).unwrap();
    let b = scene.create_object(&mesh(3, 3, 0.0), 3).unwrap();
    let c = scene.create_object(&mesh(3, 3, 0.0), 1).unwrap();

    assert_eq!(scene.registry().slot_range(a), Some(SlotRange::new(0, 2)));
    assert_eq!(scene.registry().slot_range(b), Some(SlotRange::new(2, 3)));
    assert_eq!(scene.registry().slot_range(c), Some(SlotRange::new(5, 1)));

    scene.begin_frame_selection();
    scene.select(c, 0, &[42; 64]).unwrap();

    scene.destroy_object(b).unwrap();

    assert_eq!(scene.registry().slot_range(a), Some(SlotRange::new(0, 2)));
    assert_eq!(scene.registry().slot_range(c), Some(SlotRange::new(2, 1)));

    let c_handle = scene.registry().get(c).unwrap().instance_states()[0];
    assert_eq!(scene.backend().relocations(), vec![(c_handle, k * 5, k * 2)]);
    assert_eq!(scene.backend().state_at(k * 2), Some(&[42u8; 64][..]));
}

#[test]
fn test_draw_offsets_follow_selection_order() {
    let mut scene = scene(1);
    let a = scene.create_object(&mesh(3, 3, 0.0), 1).unwrap();
    let b = scene.create_object(&mesh(4, 6, 0.0), 1).unwrap();

    scene.begin_frame_selection();
    scene.select(a, 0, &[0; 16]).unwrap();
    scene.select(b, 0, &[0; 16]).unwrap();
    scene.assemble_and_draw().unwrap();

    let draws = scene.backend().draws();
    assert_eq!(draws.len(), 2);
    assert_eq!((draws[0].start_vertex, draws[0].start_index), (0, 0));
    assert_eq!((draws[1].start_vertex, draws[1].start_index), (3, 3));
    assert_eq!(draws[1].index_count, 6);
}

#[test]
fn test_consecutive_frame_selections_start_empty() {
    let mut scene = scene(1);
    let id = scene.create_object(&mesh(3, 3, 0.0), 1).unwrap();

    scene.begin_frame_selection();
    scene.select(id, 0, &[0; 16]).unwrap();

    scene.begin_frame_selection();
    assert!(scene.frame().is_empty());
    scene.begin_frame_selection();
    assert!(scene.frame().is_empty());

    let stats = scene.assemble_and_draw().unwrap();
    assert_eq!(stats.draw_calls, 0);
}

#[test]
fn test_frame_buffers_hold_creation_bytes() {
    let mut scene = scene(1);
    let first = mesh(3, 3, 100.0);
    let second = mesh(5, 9, 200.0);
    let a = scene.create_object(&first, 1).unwrap();
    let b = scene.create_object(&second, 2).unwrap();

    scene.begin_frame_selection();
    scene.select(b, 1, &[0; 16]).unwrap();
    scene.select(a, 0, &[0; 16]).unwrap();
    scene.assemble_and_draw().unwrap();

    let backend = scene.backend();
    let stride = second.vertex_stride() as usize;
    let draws = backend.draws();
    let a_draw = draws.last().unwrap();

    let a_start = a_draw.start_vertex as usize * stride;
    assert_eq!(
        &backend.vertex_bytes()[a_start..a_start + first.vertex_bytes().len()],
        first.vertex_bytes()
    );
    assert_eq!(&backend.vertex_bytes()[..second.vertex_bytes().len()], second.vertex_bytes());

    let a_indices = a_draw.start_index as usize;
    assert_eq!(&backend.indices()[a_indices..], &first.indices[..]);
    assert_eq!(&backend.indices()[..a_indices], &second.indices[..]);
}

#[test]
fn test_destroying_newest_object_relocates_nothing() {
    let mut scene = scene(2);
    scene.create_object(&mesh(3, 3, 0.0), 2).unwrap();
    scene.create_object(&mesh(3, 3, 0.0), 1).unwrap();
    let newest = scene.create_object(&mesh(3, 3, 0.0), 3).unwrap();

    scene.destroy_object(newest).unwrap();

    assert!(scene.backend().relocations().is_empty());
}

#[test]
fn test_precondition_violations_are_not_fatal() {
    let mut scene = scene(1);
    let narrow = scene
        .create_object(
            &MeshData::new(vec![0.0; 9], 3, vec![0, 1, 2], PrimitiveTopology::TriangleList),
            1,
        )
        .unwrap();
    let wide = scene.create_object(&mesh(3, 3, 0.0), 1).unwrap();

    let err = scene.select(narrow, 0, &[0; 4]).unwrap_err();
    assert!(matches!(err, BatchError::FrameNotBegun));
    assert!(!err.is_fatal());

    scene.begin_frame_selection();
    scene.select(narrow, 0, &[0; 4]).unwrap();

    let err = scene.select(wide, 0, &[0; 4]).unwrap_err();
    assert!(matches!(err, BatchError::VertexStrideMismatch { .. }));
    assert!(!err.is_fatal());

    let err = scene.select(narrow, 0, &[0; 4]).unwrap_err();
    assert!(matches!(err, BatchError::DuplicateSelection { .. }));
    assert!(!err.is_fatal());

    scene.destroy_object(wide).unwrap();
    let err = scene.select(wide, 0, &[0; 4]).unwrap_err();
    assert!(matches!(err, BatchError::UnknownObject(_)));
    assert!(!err.is_fatal());
}

#[test]
fn test_failed_buffer_destruction_leaves_no_zombie_object() {
    let mut scene = scene(2);
    let a = scene.create_object(&mesh(3, 3, 0.0), 3).unwrap();
    let b = scene.create_object(&mesh(3, 3, 0.0), 1).unwrap();
    scene.backend_mut().fail_destroy_after(1);

    assert!(scene.destroy_object(a).is_err());

    assert!(!scene.registry().contains(a));
    assert_eq!(occupied_slots(&scene), vec![0]);
    assert_eq!(scene.registry().slot_range(b), Some(SlotRange::new(0, 1)));

    let err = scene.destroy_object(a).unwrap_err();
    assert!(matches!(err, BatchError::ObjectNotFound(_)));
}
