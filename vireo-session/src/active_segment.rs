use vireo_model::TranscriptSegment;

/// Which segment lost and which gained the highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveChange {
    pub previous: Option<usize>,
    pub current: Option<usize>,
}

/// Tracks the playback position against a segment list and keeps exactly
/// one segment (or none) flagged active.
#[derive(Debug, Clone, Default)]
pub struct ActiveSegmentIndex {
    segments: Vec<TranscriptSegment>,
    active: Option<usize>,
    position: Option<f64>,
}

impl ActiveSegmentIndex {
    pub fn new(segments: Vec<TranscriptSegment>) -> Self {
        let mut index = Self::default();
        index.replace_segments(segments);
        index
    }

    /// Swap in a new segment list and re-evaluate the last known position.
    pub fn replace_segments(&mut self, mut segments: Vec<TranscriptSegment>) -> Option<ActiveChange> {
        for segment in &mut segments {
            segment.is_active = false;
        }
        let previous = self.active.take();
        self.segments = segments;

        let current = self.position.and_then(|position| self.locate(position));
        self.set_active(current);
        (previous != current).then_some(ActiveChange { previous, current })
    }

    /// Move to `position`. Returns a change only when the highlighted
    /// segment is different from before.
    pub fn update(&mut self, position: f64) -> Option<ActiveChange> {
        let current = if position.is_finite() {
            self.position = Some(position);
            self.locate(position)
        } else {
            self.position = None;
            None
        };

        let previous = self.active;
        if previous == current {
            return None;
        }
        self.set_active(current);
        Some(ActiveChange { previous, current })
    }

    pub fn clear(&mut self) -> Option<ActiveChange> {
        let previous = self.active;
        self.position = None;
        self.set_active(None);
        previous.map(|previous| ActiveChange {
            previous: Some(previous),
            current: None,
        })
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active(&self) -> Option<&TranscriptSegment> {
        self.active.and_then(|index| self.segments.get(index))
    }

    /// Text for the caption overlay.
    pub fn active_text(&self) -> Option<&str> {
        self.active().map(|segment| segment.text.as_str())
    }

    pub fn segments(&self) -> &[TranscriptSegment] {
        &self.segments
    }

    pub fn position(&self) -> Option<f64> {
        self.position
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn locate(&self, position: f64) -> Option<usize> {
        self.segments
            .iter()
            .position(|segment| segment.contains(position))
    }

    fn set_active(&mut self, next: Option<usize>) {
        if let Some(segment) = self.active.and_then(|index| self.segments.get_mut(index)) {
            segment.is_active = false;
        }
        if let Some(segment) = next.and_then(|index| self.segments.get_mut(index)) {
            segment.is_active = true;
        }
        self.active = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments() -> Vec<TranscriptSegment> {
        vec![
            TranscriptSegment::new(0.0, 5.0, "one"),
            TranscriptSegment::new(5.0, 10.0, "two"),
            TranscriptSegment::new(12.0, 20.0, "three"),
        ]
    }

    fn active_count(index: &ActiveSegmentIndex) -> usize {
        index.segments().iter().filter(|s| s.is_active).count()
    }

    #[test]
    fn highlights_unique_containing_segment() {
        let mut index = ActiveSegmentIndex::new(segments());

        let change = index.update(5.0).expect("change");
        assert_eq!(change, ActiveChange { previous: None, current: Some(1) });
        assert_eq!(index.active_text(), Some("two"));
        assert_eq!(active_count(&index), 1);

        // Same segment: no change reported.
        assert_eq!(index.update(7.5), None);
    }

    #[test]
    fn gap_and_end_boundaries_clear_highlight() {
        let mut index = ActiveSegmentIndex::new(segments());
        index.update(1.0);

        let change = index.update(10.0).expect("change");
        assert_eq!(change.current, None);
        assert_eq!(active_count(&index), 0);

        assert!(index.update(20.0).is_none());
        assert_eq!(index.active_text(), None);
    }

    #[test]
    fn non_finite_position_clears() {
        let mut index = ActiveSegmentIndex::new(segments());
        index.update(13.0);
        assert!(index.update(f64::NAN).is_some());
        assert_eq!(index.active_index(), None);
    }

    #[test]
    fn at_most_one_active_over_a_sweep() {
        let mut index = ActiveSegmentIndex::new(segments());
        let mut position = -1.0;
        while position < 25.0 {
            index.update(position);
            assert!(active_count(&index) <= 1);
            if let Some(active) = index.active() {
                assert!(active.contains(position));
            }
            position += 0.25;
        }
    }

    #[test]
    fn replacing_segments_keeps_position() {
        let mut index = ActiveSegmentIndex::default();
        assert!(index.update(6.0).is_none());

        let change = index.replace_segments(segments()).expect("change");
        assert_eq!(change.current, Some(1));
        assert_eq!(index.active_text(), Some("two"));
    }
}
