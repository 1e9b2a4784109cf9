use super::{
    error::TouchError,
    types::{DisplayId, PointerId, PointerPhase, PointerSample, RawPointerSample, MAX_POINTERS},
};

#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub samples: Vec<PointerSample>,
    pub rejected: Vec<TouchError>,
}

/// Per-display gate between the input subsystem and the explorer: orders
/// samples, validates pointer lifecycles and stamps monotonic receipt time.
#[derive(Debug)]
pub struct PointerNormalizer {
    display_id: DisplayId,
    active: heapless::Vec<PointerId, MAX_POINTERS>,
    last_receipt_ms: u64,
}

impl PointerNormalizer {
    pub fn new(display_id: DisplayId) -> Self {
        Self {
            display_id,
            active: heapless::Vec::new(),
            last_receipt_ms: 0,
        }
    }

    pub fn display_id(&self) -> DisplayId {
        self.display_id
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn is_active(&self, pointer_id: PointerId) -> bool {
        self.active.contains(&pointer_id)
    }

    pub fn normalize(&mut self, receipt_ms: u64, raw: &[RawPointerSample]) -> NormalizedBatch {
        let receipt_ms = receipt_ms.max(self.last_receipt_ms);
        self.last_receipt_ms = receipt_ms;

        let mut ordered = raw.to_vec();
        ordered.sort_by_key(|sample| (sample.event_time_ms, sample.pointer_id));

        let mut batch = NormalizedBatch::default();
        for sample in ordered {
            match self.admit(&sample) {
                Ok(()) => batch.samples.push(PointerSample {
                    pointer_id: sample.pointer_id,
                    display_id: sample.display_id,
                    position: sample.position,
                    raw_position: sample.raw_position,
                    event_time_ms: sample.event_time_ms,
                    receipt_ms,
                    phase: sample.phase,
                }),
                Err(err) => {
                    log::debug!("display {} dropped sample: {err}", self.display_id);
                    batch.rejected.push(err);
                }
            }
        }
        batch
    }

    /// Forgets every pointer; used when the platform interrupts the stream.
    pub fn reset(&mut self) {
        self.active.clear();
    }

    fn admit(&mut self, sample: &RawPointerSample) -> Result<(), TouchError> {
        if sample.display_id != self.display_id {
            return Err(TouchError::DisplayMismatch {
                expected: self.display_id,
                actual: sample.display_id,
            });
        }

        let known = self.active.iter().position(|id| *id == sample.pointer_id);
        match (sample.phase, known) {
            (PointerPhase::Down, Some(_)) => Err(TouchError::DuplicatePointerDown {
                display_id: self.display_id,
                pointer_id: sample.pointer_id,
            }),
            (PointerPhase::Down, None) => {
                self.active
                    .push(sample.pointer_id)
                    .map_err(|_| TouchError::PointerCapacity {
                        display_id: self.display_id,
                        capacity: MAX_POINTERS,
                    })
            }
            (PointerPhase::Move, Some(_)) => Ok(()),
            (PointerPhase::Up | PointerPhase::Cancel, Some(idx)) => {
                self.active.swap_remove(idx);
                Ok(())
            }
            (_, None) => Err(TouchError::InvalidPointerReference {
                display_id: self.display_id,
                pointer_id: sample.pointer_id,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::touch::types::Point;

    fn raw(pointer_id: PointerId, phase: PointerPhase, t_ms: u64) -> RawPointerSample {
        RawPointerSample::new(0, pointer_id, phase, Point::new(10.0, 20.0), t_ms)
    }

    #[test]
    fn same_timestamp_samples_are_ordered_by_pointer_id() {
        let mut normalizer = PointerNormalizer::new(0);
        let batch = normalizer.normalize(
            0,
            &[raw(2, PointerPhase::Down, 0), raw(0, PointerPhase::Down, 0)],
        );
        let ids: Vec<_> = batch.samples.iter().map(|s| s.pointer_id).collect();
        assert_eq!(ids, vec![0, 2]);
        assert!(batch.rejected.is_empty());
        assert_eq!(normalizer.active_count(), 2);
    }

    #[test]
    fn unknown_pointer_is_rejected_without_touching_state() {
        let mut normalizer = PointerNormalizer::new(0);
        normalizer.normalize(0, &[raw(0, PointerPhase::Down, 0)]);

        let batch = normalizer.normalize(10, &[raw(5, PointerPhase::Move, 10)]);
        assert!(batch.samples.is_empty());
        assert_eq!(
            batch.rejected,
            vec![TouchError::InvalidPointerReference {
                display_id: 0,
                pointer_id: 5
            }]
        );
        assert!(normalizer.is_active(0));
    }

    #[test]
    fn duplicate_down_and_foreign_display_are_rejected() {
        let mut normalizer = PointerNormalizer::new(3);
        let mut foreign = raw(0, PointerPhase::Down, 0);
        foreign.display_id = 4;
        let mut first = raw(0, PointerPhase::Down, 0);
        first.display_id = 3;

        let batch = normalizer.normalize(0, &[foreign, first, first]);
        assert_eq!(batch.samples.len(), 1);
        assert_eq!(
            batch.rejected,
            vec![
                TouchError::DisplayMismatch {
                    expected: 3,
                    actual: 4
                },
                TouchError::DuplicatePointerDown {
                    display_id: 3,
                    pointer_id: 0
                },
            ]
        );
    }

    #[test]
    fn receipt_time_never_goes_backwards() {
        let mut normalizer = PointerNormalizer::new(0);
        normalizer.normalize(100, &[raw(0, PointerPhase::Down, 0)]);
        let batch = normalizer.normalize(40, &[raw(0, PointerPhase::Up, 40)]);
        assert_eq!(batch.samples[0].receipt_ms, 100);
        assert_eq!(batch.samples[0].event_time_ms, 40);
        assert_eq!(normalizer.active_count(), 0);
    }

    #[test]
    fn reset_forgets_active_pointers() {
        let mut normalizer = PointerNormalizer::new(0);
        normalizer.normalize(0, &[raw(0, PointerPhase::Down, 0)]);
        normalizer.reset();

        let batch = normalizer.normalize(10, &[raw(0, PointerPhase::Up, 10)]);
        assert_eq!(batch.rejected.len(), 1);
    }
}
