use super::{
    config::ExplorerConfig,
    types::{Point, PointerId},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActivationKind {
    Click,
    LongClick,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum TapState {
    WaitingFirstTap,
    WaitingSecondTap { first_up_ms: u64, at: Point },
    SecondTapDown,
    Resolved(ActivationKind),
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct ExtraPointerPress {
    pointer_id: PointerId,
    down_ms: u64,
    at: Point,
    moved: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct CompletedTap {
    up_ms: u64,
    at: Point,
}

/// Resolves double tap and double-tap-and-hold of the primary finger, and
/// double taps of a second finger while the first one is held.
#[derive(Clone, Debug)]
pub struct TapDisambiguator {
    tap_timeout_ms: u64,
    double_tap_timeout_ms: u64,
    long_press_timeout_ms: u64,
    touch_slop_px: f32,
    double_tap_slop_px: f32,
    state: TapState,
    extra_press: Option<ExtraPointerPress>,
    extra_taps: heapless::Vec<CompletedTap, 2>,
    pending: Option<ActivationKind>,
}

impl TapDisambiguator {
    pub fn new(config: &ExplorerConfig) -> Self {
        Self {
            tap_timeout_ms: config.tap_timeout_ms,
            double_tap_timeout_ms: config.double_tap_timeout_ms,
            long_press_timeout_ms: config.long_press_timeout_ms,
            touch_slop_px: config.touch_slop_px,
            double_tap_slop_px: config.double_tap_slop_px,
            state: TapState::WaitingFirstTap,
            extra_press: None,
            extra_taps: heapless::Vec::new(),
            pending: None,
        }
    }

    pub fn reset(&mut self) {
        self.state = TapState::WaitingFirstTap;
        self.extra_press = None;
        self.extra_taps.clear();
        self.pending = None;
    }

    /// Drops the primary-finger double tap in progress; second-finger taps
    /// and a resolved activation survive.
    pub fn abandon_primary(&mut self) {
        if !matches!(self.state, TapState::Resolved(_)) {
            self.state = TapState::WaitingFirstTap;
        }
    }

    /// Records the first tap and returns the deadline of the double-tap
    /// window.
    pub fn first_tap(&mut self, up_ms: u64, at: Point) -> u64 {
        self.state = TapState::WaitingSecondTap {
            first_up_ms: up_ms,
            at,
        };
        up_ms.saturating_add(self.double_tap_timeout_ms)
    }

    pub fn first_tap_position(&self) -> Option<Point> {
        match self.state {
            TapState::WaitingSecondTap { at, .. } => Some(at),
            _ => None,
        }
    }

    pub fn accepts_second_tap(&self, now_ms: u64, at: Point) -> bool {
        match self.state {
            TapState::WaitingSecondTap {
                first_up_ms,
                at: first_at,
            } => {
                now_ms.saturating_sub(first_up_ms) <= self.double_tap_timeout_ms
                    && first_at.distance_to(at) <= self.double_tap_slop_px
            }
            _ => false,
        }
    }

    /// Records the second press and returns the long-press deadline.
    pub fn second_tap_down(&mut self, now_ms: u64) -> u64 {
        self.state = TapState::SecondTapDown;
        now_ms.saturating_add(self.long_press_timeout_ms)
    }

    pub fn second_tap_up(&mut self) -> Option<ActivationKind> {
        match self.state {
            TapState::SecondTapDown => {
                self.resolve(ActivationKind::Click);
                Some(ActivationKind::Click)
            }
            _ => None,
        }
    }

    pub fn long_press_elapsed(&mut self) -> Option<ActivationKind> {
        match self.state {
            TapState::SecondTapDown => {
                self.state = TapState::Resolved(ActivationKind::LongClick);
                Some(ActivationKind::LongClick)
            }
            _ => None,
        }
    }

    pub fn extra_pointer_down(&mut self, pointer_id: PointerId, now_ms: u64, at: Point) {
        self.extra_press = Some(ExtraPointerPress {
            pointer_id,
            down_ms: now_ms,
            at,
            moved: false,
        });
    }

    /// Returns true once the extra pointer has left the touch slop.
    pub fn extra_pointer_moved(&mut self, pointer_id: PointerId, at: Point) -> bool {
        match self.extra_press.as_mut() {
            Some(press) if press.pointer_id == pointer_id => {
                if press.at.distance_to(at) > self.touch_slop_px {
                    press.moved = true;
                }
                press.moved
            }
            _ => false,
        }
    }

    pub fn extra_pointer_up(&mut self, pointer_id: PointerId, now_ms: u64, at: Point) {
        let Some(press) = self.extra_press.take() else {
            return;
        };
        if press.pointer_id != pointer_id {
            self.extra_press = Some(press);
            return;
        }

        let is_tap = !press.moved
            && press.at.distance_to(at) <= self.touch_slop_px
            && now_ms.saturating_sub(press.down_ms) <= self.tap_timeout_ms;
        if !is_tap {
            self.extra_taps.clear();
            return;
        }

        let chains = self.extra_taps.last().is_some_and(|previous| {
            now_ms.saturating_sub(previous.up_ms) <= self.double_tap_timeout_ms + self.tap_timeout_ms
                && previous.at.distance_to(at) <= self.double_tap_slop_px
        });
        if !chains {
            self.extra_taps.clear();
        }
        let tap = CompletedTap { up_ms: now_ms, at };
        if self.extra_taps.push(tap).is_err() {
            self.extra_taps.clear();
        }
        if self.extra_taps.len() == 2 {
            self.extra_taps.clear();
            log::debug!("second-finger double tap resolved");
            self.resolve(ActivationKind::Click);
        }
    }

    /// Activation to perform once the session ends.
    pub fn take_pending(&mut self) -> Option<ActivationKind> {
        self.pending.take()
    }

    fn resolve(&mut self, kind: ActivationKind) {
        self.state = TapState::Resolved(kind);
        self.pending = Some(kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disambiguator() -> TapDisambiguator {
        TapDisambiguator::new(&ExplorerConfig::default())
    }

    #[test]
    fn double_tap_resolves_to_click() {
        let mut taps = disambiguator();
        let at = Point::new(100.0, 100.0);

        assert_eq!(taps.first_tap(100, at), 400);
        assert!(taps.accepts_second_tap(120, at.offset(30.0, 0.0)));
        assert_eq!(taps.second_tap_down(120), 620);
        assert_eq!(taps.second_tap_up(), Some(ActivationKind::Click));
        assert_eq!(taps.take_pending(), Some(ActivationKind::Click));
        assert_eq!(taps.take_pending(), None);
    }

    #[test]
    fn second_tap_outside_window_or_slop_is_rejected() {
        let mut taps = disambiguator();
        let at = Point::new(100.0, 100.0);
        taps.first_tap(100, at);

        assert!(!taps.accepts_second_tap(401, at));
        assert!(!taps.accepts_second_tap(150, at.offset(150.0, 0.0)));
    }

    #[test]
    fn held_second_tap_is_long_click_without_pending_click() {
        let mut taps = disambiguator();
        let at = Point::new(10.0, 10.0);
        taps.first_tap(100, at);
        taps.second_tap_down(120);

        assert_eq!(taps.long_press_elapsed(), Some(ActivationKind::LongClick));
        assert_eq!(taps.second_tap_up(), None);
        assert_eq!(taps.take_pending(), None);
    }

    #[test]
    fn two_second_finger_taps_resolve_to_click() {
        let mut taps = disambiguator();
        let at = Point::new(400.0, 400.0);

        taps.extra_pointer_down(1, 100, at);
        taps.extra_pointer_up(1, 200, at);
        assert_eq!(taps.take_pending(), None);

        taps.extra_pointer_down(2, 220, at);
        taps.extra_pointer_up(2, 320, at);
        assert_eq!(taps.take_pending(), Some(ActivationKind::Click));
    }

    #[test]
    fn moving_second_finger_is_not_a_tap() {
        let mut taps = disambiguator();
        let at = Point::new(400.0, 400.0);

        taps.extra_pointer_down(1, 100, at);
        assert!(taps.extra_pointer_moved(1, at.offset(30.0, 0.0)));
        taps.extra_pointer_up(1, 150, at);
        taps.extra_pointer_down(2, 170, at);
        taps.extra_pointer_up(2, 250, at);

        assert_eq!(taps.take_pending(), None);
    }
}
