use crate::rendering::{
    backend::{DrawIndexed, GpuBackend, PrimitiveTopology},
    error::{BatchError, BatchResult},
    frame_list::{FrameEntry, FrameList},
    object_registry::ObjectRegistry,
};

/// Where one selected object's geometry starts in the frame's shared buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawRange {
    pub start_index: u32,
    pub start_vertex: u32,
    pub index_count: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub objects: u32,
    pub draw_calls: u32,
    pub topology_changes: u32,
    pub vertex_bytes: usize,
    pub indices: usize,
}

/// Prefix sums of vertex and index counts, in selection order.
pub fn draw_ranges(entries: &[FrameEntry]) -> Vec<DrawRange> {
    entries
        .iter()
        .scan((0u32, 0u32), |(next_index, next_vertex), entry| {
            let range = DrawRange {
                start_index: *next_index,
                start_vertex: *next_vertex,
                index_count: entry.index_count,
            };

            *next_index += entry.index_count;
            *next_vertex += entry.vertex_count;

            Some(range)
        })
        .collect()
}

/// Uploads the frame's geometry once and issues one draw per occupied slot of
/// every selected object.
///
/// An empty frame touches nothing on the backend.
pub fn assemble_and_draw(
    frame: &FrameList,
    registry: &ObjectRegistry,
    backend: &mut impl GpuBackend,
) -> BatchResult<FrameStats> {
    if !frame.is_begun() {
        return Err(BatchError::FrameNotBegun);
    }

    let Some(stride) = frame.vertex_stride() else {
        return Ok(FrameStats::default());
    };

    backend.set_vertex_buffer(frame.vertex_bytes(), stride)?;
    backend.set_index_buffer(frame.indices())?;

    let mut stats = FrameStats {
        objects: frame.len() as u32,
        vertex_bytes: frame.vertex_bytes().len(),
        indices: frame.indices().len(),
        ..Default::default()
    };
    let mut current_topology: Option<PrimitiveTopology> = None;

    for (entry, range) in frame.entries().iter().zip(draw_ranges(frame.entries())) {
        let object = registry
            .get(entry.object)
            .ok_or(BatchError::UnknownObject(entry.object))?;

        if current_topology != Some(entry.topology) {
            backend.set_topology(entry.topology)?;
            current_topology = Some(entry.topology);
            stats.topology_changes += 1;
        }

        for handle in object.instance_states() {
            backend.bind_instance_state(*handle)?;
            backend.draw_indexed(DrawIndexed {
                index_count: range.index_count,
                instance_count: 1,
                start_index: range.start_index,
                start_vertex: range.start_vertex,
                start_instance: 0,
            })?;
            stats.draw_calls += 1;
        }
    }

    log::debug!(
        "Frame: {} objects, {} draws, {} topology changes, {} vertex bytes, {} indices",
        stats.objects,
        stats.draw_calls,
        stats.topology_changes,
        stats.vertex_bytes,
        stats.indices
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::MeshData,
        rendering::{
            object_registry::ObjectId,
            recording_backend::{BackendCall, RecordingBackend},
        },
    };

    fn entry(vertex_count: u32, index_count: u32) -> FrameEntry {
        FrameEntry {
            object: ObjectId::default(),
            vertex_count,
            index_count,
            topology: PrimitiveTopology::TriangleList,
        }
    }

    fn mesh(vertex_count: u32, index_count: u32, topology: PrimitiveTopology) -> MeshData {
        MeshData::new(
            vec![0.5; (vertex_count * 3) as usize],
            3,
            (0..index_count).map(|i| i % vertex_count).collect(),
            topology,
        )
    }

    #[test]
    fn test_draw_ranges_are_prefix_sums() {
        let ranges = draw_ranges(&[entry(3, 3), entry(4, 6), entry(2, 5)]);

        assert_eq!(
            ranges,
            vec![
                DrawRange {
                    start_index: 0,
                    start_vertex: 0,
                    index_count: 3
                },
                DrawRange {
                    start_index: 3,
                    start_vertex: 3,
                    index_count: 6
                },
                DrawRange {
                    start_index: 9,
                    start_vertex: 7,
                    index_count: 5
                },
            ]
        );
    }

    #[test]
    fn test_empty_frame_is_a_no_op() {
        let mut backend = RecordingBackend::new();
        let registry = ObjectRegistry::new(1);
        let mut frame = FrameList::new();
        frame.begin();

        let stats = assemble_and_draw(&frame, &registry, &mut backend).unwrap();

        assert_eq!(stats, FrameStats::default());
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_unbegun_frame_is_rejected() {
        let mut backend = RecordingBackend::new();
        let registry = ObjectRegistry::new(1);

        let err = assemble_and_draw(&FrameList::new(), &registry, &mut backend);

        assert!(matches!(err, Err(BatchError::FrameNotBegun)));
    }

    #[test]
    fn test_draws_every_slot_and_skips_redundant_topology_changes() {
        let mut backend = RecordingBackend::new();
        let mut registry = ObjectRegistry::new(2);
        let a = registry
            .create_object(&mut backend, &mesh(3, 3, PrimitiveTopology::TriangleList), 2)
            .unwrap();
        let b = registry
            .create_object(&mut backend, &mesh(4, 6, PrimitiveTopology::TriangleList), 1)
            .unwrap();
        let c = registry
            .create_object(&mut backend, &mesh(2, 2, PrimitiveTopology::LineList), 1)
            .unwrap();

        let mut frame = FrameList::new();
        frame.begin();
        frame.select(&registry, &mut backend, a, 0, &[0; 4]).unwrap();
        frame.select(&registry, &mut backend, b, 0, &[0; 4]).unwrap();
        frame.select(&registry, &mut backend, c, 0, &[0; 4]).unwrap();
        backend.clear_calls();

        let stats = assemble_and_draw(&frame, &registry, &mut backend).unwrap();

        assert_eq!(stats.objects, 3);
        assert_eq!(stats.draw_calls, 4);
        assert_eq!(stats.topology_changes, 2);
        assert_eq!(stats.indices, 11);

        let topologies: Vec<_> = backend
            .calls()
            .iter()
            .filter_map(|call| match call {
                BackendCall::SetTopology(topology) => Some(*topology),
                _ => None,
            })
            .collect();
        assert_eq!(
            topologies,
            vec![PrimitiveTopology::TriangleList, PrimitiveTopology::LineList]
        );

        let bound_offsets: Vec<_> = backend
            .calls()
            .iter()
            .filter_map(|call| match call {
                BackendCall::BindInstanceState { offset, .. } => Some(*offset),
                _ => None,
            })
            .collect();
        assert_eq!(bound_offsets, vec![0, 2, 4, 6]);

        let draws = backend.draws();
        assert!(draws.iter().all(|d| d.instance_count == 1));
        assert_eq!((draws[2].start_vertex, draws[2].start_index), (3, 3));
        assert_eq!((draws[3].start_vertex, draws[3].start_index), (7, 9));
    }

    #[test]
    fn test_geometry_is_uploaded_once_before_drawing() {
        let mut backend = RecordingBackend::new();
        let mut registry = ObjectRegistry::new(1);
        let id = registry
            .create_object(&mut backend, &mesh(3, 3, PrimitiveTopology::TriangleList), 3)
            .unwrap();

        let mut frame = FrameList::new();
        frame.begin();
        frame.select(&registry, &mut backend, id, 1, &[0; 4]).unwrap();
        backend.clear_calls();

        assemble_and_draw(&frame, &registry, &mut backend).unwrap();

        assert_eq!(
            &backend.calls()[..3],
            &[
                BackendCall::SetVertexBuffer {
                    len: 36,
                    stride: 12
                },
                BackendCall::SetIndexBuffer { count: 3 },
                BackendCall::SetTopology(PrimitiveTopology::TriangleList),
            ]
        );
        assert_eq!(backend.draws().len(), 3);
    }
}
