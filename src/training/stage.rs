//! Stage bookkeeping over the flat iteration counter
//!
//! A stage lasts `iters_per_scale * discriminator_steps` iterations. The
//! counter starts before stage 0 and moves forward one stage at a time.

use crate::error::{Result, SinGanError};

/// Current stage and the window arithmetic around it
#[derive(Debug, Clone)]
pub struct StageController {
    curr_stage: Option<usize>,
    num_scales: Option<usize>,
    window: usize,
}

impl StageController {
    /// Create a controller that has not entered any stage yet
    pub fn new(iters_per_scale: usize, discriminator_steps: usize, num_scales: Option<usize>) -> Self {
        Self {
            curr_stage: None,
            num_scales,
            window: (iters_per_scale * discriminator_steps).max(1),
        }
    }

    /// Iterations per stage
    pub fn window(&self) -> usize {
        self.window
    }

    /// Current stage, `None` before the first transition
    pub fn current(&self) -> Option<usize> {
        self.curr_stage
    }

    /// Current stage with `-1` for "untrained"
    pub fn current_index(&self) -> i64 {
        self.curr_stage.map_or(-1, |s| s as i64)
    }

    /// Number of scales, once known
    pub fn num_scales(&self) -> Option<usize> {
        self.num_scales
    }

    /// Record the number of scales once the real pyramid is known
    pub fn set_num_scales(&mut self, num_scales: usize) -> Result<()> {
        match self.num_scales {
            Some(known) if known != num_scales => Err(SinGanError::config(
                self.current_index(),
                "number of scales in the real pyramid",
                known,
                num_scales,
            )),
            _ => {
                self.num_scales = Some(num_scales);
                Ok(())
            }
        }
    }

    /// Whether iteration `iter` starts a new stage
    pub fn is_transition(&self, iter: usize) -> bool {
        iter % self.window == 0
    }

    /// Whether iteration `iter` is the last one of a stage
    pub fn is_window_end(&self, iter: usize) -> bool {
        (iter + 1) % self.window == 0
    }

    /// Move to the next stage and return it
    pub fn advance(&mut self) -> Result<usize> {
        let next = self.curr_stage.map_or(0, |s| s + 1);
        if let Some(num_scales) = self.num_scales {
            if next >= num_scales {
                return Err(SinGanError::config(
                    next as i64,
                    "stage index",
                    format!("< {}", num_scales),
                    next,
                ));
            }
        }
        self.curr_stage = Some(next);
        Ok(next)
    }

    /// Jump to a stage restored from a snapshot
    pub fn restore(&mut self, stage: Option<usize>) {
        self.curr_stage = stage;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_follows_window() {
        let mut ctrl = StageController::new(4, 1, Some(3));
        let mut stages = Vec::new();

        for iter in 0..12 {
            if ctrl.is_transition(iter) {
                ctrl.advance().unwrap();
            }
            stages.push(ctrl.current_index());
            assert_eq!(ctrl.current_index(), (iter / ctrl.window()) as i64);
        }

        assert_eq!(stages, vec![0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2]);
    }

    #[test]
    fn test_window_includes_discriminator_steps() {
        let ctrl = StageController::new(4, 3, None);
        assert_eq!(ctrl.window(), 12);
        assert!(ctrl.is_transition(0));
        assert!(ctrl.is_transition(12));
        assert!(!ctrl.is_transition(4));
        assert!(ctrl.is_window_end(11));
        assert!(!ctrl.is_window_end(12));
    }

    #[test]
    fn test_untrained_is_minus_one() {
        let ctrl = StageController::new(10, 1, None);
        assert_eq!(ctrl.current(), None);
        assert_eq!(ctrl.current_index(), -1);
    }

    #[test]
    fn test_overflow_is_configuration_error() {
        let mut ctrl = StageController::new(1, 1, Some(2));
        ctrl.advance().unwrap();
        ctrl.advance().unwrap();

        let err = ctrl.advance().unwrap_err();
        assert!(matches!(err, SinGanError::Configuration { stage: 2, .. }));
        assert_eq!(ctrl.current(), Some(1));
    }

    #[test]
    fn test_num_scales_cannot_change() {
        let mut ctrl = StageController::new(1, 1, None);
        ctrl.set_num_scales(3).unwrap();
        ctrl.set_num_scales(3).unwrap();
        assert!(ctrl.set_num_scales(4).is_err());
    }
}
