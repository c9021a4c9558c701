use std::path::Path;
use std::process::Stdio;

use ffprobe::FfProbe;
use tokio::process::Command;
use tracing::debug;

use super::model::MediaInfo;
use crate::error::{Error, Result};

/// Reads duration and frame rate of `source` with the ffprobe at
/// `ffprobe_bin`.
pub async fn probe(ffprobe_bin: &Path, source: &Path) -> Result<MediaInfo> {
    let mut command = Command::new(ffprobe_bin);
    command
        .args(["-v", "error", "-show_format", "-show_streams", "-print_format", "json"])
        .arg(source)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let output = command.output().await.map_err(|e| {
        Error::ProbeFailed(format!("cannot run {}: {e}", ffprobe_bin.display()))
    })?;

    if !output.status.success() {
        return Err(Error::ProbeFailed(format!(
            "ffprobe exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let props: FfProbe = serde_json::from_slice(&output.stdout)
        .map_err(|e| Error::ProbeFailed(format!("unreadable ffprobe output: {e}")))?;

    let info = media_info(&props);
    debug!(
        "probed duration {:.3}s, frame rate {:.3}",
        info.duration_seconds, info.frame_rate
    );

    Ok(info)
}

fn media_info(props: &FfProbe) -> MediaInfo {
    let video = props
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));

    MediaInfo {
        duration_seconds: parse_duration(props.format.duration.as_deref()),
        frame_rate: video.map_or(0.0, |s| parse_frame_rate(&s.r_frame_rate)),
    }
}

/// Parses a rational `num/den` rate. A zero denominator or anything
/// unparsable yields `0.0`.
pub fn parse_frame_rate(rate: &str) -> f64 {
    let rate = rate.trim();

    let value = match rate.split_once('/') {
        Some((num, den)) => match (num.trim().parse::<f64>(), den.trim().parse::<f64>()) {
            (Ok(_), Ok(den)) if den == 0.0 => 0.0,
            (Ok(num), Ok(den)) => num / den,
            _ => 0.0,
        },
        None => rate.parse::<f64>().unwrap_or(0.0),
    };

    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Parses a decimal duration in seconds; absent or unparsable is `0.0`.
pub fn parse_duration(duration: Option<&str>) -> f64 {
    duration
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use ffprobe::Stream;

    use super::*;

    #[test]
    fn rational_frame_rates() {
        assert_eq!(parse_frame_rate("30/1"), 30.0);
        assert_eq!(parse_frame_rate("25"), 25.0);
        assert!((parse_frame_rate("30000/1001") - 29.97).abs() < 0.01);
    }

    #[test]
    fn zero_denominator_is_unknown() {
        assert_eq!(parse_frame_rate("0/0"), 0.0);
        assert_eq!(parse_frame_rate("30/0"), 0.0);
    }

    #[test]
    fn malformed_frame_rate_is_unknown() {
        assert_eq!(parse_frame_rate(""), 0.0);
        assert_eq!(parse_frame_rate("abc/1"), 0.0);
        assert_eq!(parse_frame_rate("-30/1"), 0.0);
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration(Some("120.500000")), 120.5);
        assert_eq!(parse_duration(Some("N/A")), 0.0);
        assert_eq!(parse_duration(None), 0.0);
    }

    fn stream(codec_type: &str, r_frame_rate: &str) -> Stream {
        Stream {
            codec_type: Some(codec_type.to_string()),
            r_frame_rate: r_frame_rate.to_string(),
            ..Default::default()
        }
    }

    fn props(streams: Vec<Stream>, duration: Option<&str>) -> FfProbe {
        let mut props = FfProbe {
            streams,
            ..Default::default()
        };
        props.format.duration = duration.map(str::to_string);
        props
    }

    #[test]
    fn video_stream_is_preferred_over_audio() {
        let info = media_info(&props(
            vec![stream("audio", "0/0"), stream("video", "24/1")],
            Some("10.000000"),
        ));
        assert_eq!(info.duration_seconds, 10.0);
        assert_eq!(info.frame_rate, 24.0);
    }

    #[test]
    fn no_video_stream_means_unknown_rate() {
        let info = media_info(&props(vec![stream("audio", "44100/1")], Some("3.5")));
        assert_eq!(info.frame_rate, 0.0);
        assert_eq!(info.duration_seconds, 3.5);
    }

    #[tokio::test]
    async fn missing_ffprobe_fails() {
        let result = probe(
            Path::new("/nonexistent/ffprobe-binary"),
            Path::new("video.mp4"),
        )
        .await;
        assert!(matches!(result, Err(Error::ProbeFailed(_))));
    }
}
