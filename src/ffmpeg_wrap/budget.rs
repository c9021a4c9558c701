use super::model::{ExtractionPlan, FrameBudget, MediaInfo};

/// Expected number of images an extraction will write.
///
/// Returns [`FrameBudget::UNKNOWN`] whenever duration or frame rate are
/// missing, so progress falls back to an indeterminate display instead of a
/// made-up total.
pub fn estimate(info: &MediaInfo, plan: &ExtractionPlan) -> FrameBudget {
    let range = plan.range();
    let start = range.start().unwrap_or(0.0);

    let effective_duration = match range.end() {
        Some(end) => (end - start).max(0.0),
        None if info.duration_seconds > 0.0 => (info.duration_seconds - start).max(0.0),
        None => 0.0,
    };

    if info.frame_rate > 0.0 && effective_duration > 0.0 {
        let frames = (effective_duration * info.frame_rate / plan.every() as f64).floor();
        FrameBudget::new(frames as u64)
    } else {
        FrameBudget::UNKNOWN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffmpeg_wrap::model::{OutputPattern, TimeRange};

    fn plan(every: u32, start: Option<f64>, end: Option<f64>) -> ExtractionPlan {
        ExtractionPlan::new(
            every,
            TimeRange::new(start, end).unwrap(),
            "out",
            OutputPattern::default(),
        )
        .unwrap()
    }

    fn info(duration_seconds: f64, frame_rate: f64) -> MediaInfo {
        MediaInfo {
            duration_seconds,
            frame_rate,
        }
    }

    #[test]
    fn whole_source() {
        assert_eq!(estimate(&info(120.0, 30.0), &plan(1, None, None)).get(), 3600);
    }

    #[test]
    fn decimated() {
        assert_eq!(estimate(&info(120.0, 30.0), &plan(3, None, None)).get(), 1200);
        assert_eq!(estimate(&info(10.0, 24.0), &plan(4, None, None)).get(), 60);
    }

    #[test]
    fn unknown_frame_rate() {
        assert!(!estimate(&info(120.0, 0.0), &plan(1, None, None)).is_known());
        assert!(!estimate(&info(120.0, 0.0), &plan(1, Some(1.0), Some(5.0))).is_known());
    }

    #[test]
    fn explicit_window() {
        assert_eq!(
            estimate(&info(0.0, 25.0), &plan(1, Some(10.0), Some(20.0))).get(),
            250
        );
    }

    #[test]
    fn start_only_uses_remaining_duration() {
        assert_eq!(estimate(&info(60.0, 10.0), &plan(1, Some(50.0), None)).get(), 100);
        assert!(!estimate(&info(60.0, 10.0), &plan(1, Some(90.0), None)).is_known());
    }

    #[test]
    fn unknown_duration_without_end() {
        assert!(!estimate(&info(0.0, 30.0), &plan(1, Some(5.0), None)).is_known());
    }

    #[test]
    fn rounds_down() {
        // 29.97 fps over 10s kept 1 in 3: 99.9 frames
        assert_eq!(estimate(&info(10.0, 29.97), &plan(3, None, None)).get(), 99);
    }
}
