//! Rendering a growing time series into video frames.
//!
//! Frame `k` shows the first `ends[k]` samples of every trace on fixed axes.
//! Frames are drawn with `plotters` into an RGB buffer and either piped to
//! `ffmpeg` as raw video or written as numbered PNG files.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result, anyhow, bail};
use plotters::prelude::*;

const FONT_FAMILY: &str = "sans-serif";

/// One channel to animate.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub label: String,
    pub color: [u8; 3],
    pub times: Vec<f64>,
    pub values: Vec<f64>,
}

impl Trace {
    pub fn len(&self) -> usize {
        self.times.len().min(self.values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoSettings {
    pub fps: u32,
    pub codec: String,
    pub ffmpeg: String,
    pub width: u32,
    pub height: u32,
    /// Samples added per frame.
    pub stride: usize,
    pub y_range: (f64, f64),
    pub title: String,
    pub y_label: String,
    /// Font used for all text; frames carry no text when `None`.
    pub font: Option<PathBuf>,
}

impl Default for VideoSettings {
    fn default() -> Self {
        VideoSettings {
            fps: 30,
            codec: "libx264".to_string(),
            ffmpeg: "ffmpeg".to_string(),
            width: 640,
            height: 480,
            stride: 1,
            y_range: (38.0, 58.0),
            title: "Sensor playback".to_string(),
            y_label: "Filtered Value".to_string(),
            font: None,
        }
    }
}

/// Where frames go.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoSink {
    /// Encode to a video file through an external `ffmpeg`.
    Ffmpeg(PathBuf),
    /// Write `frame_00000.png`, ... into a directory.
    PngFrames(PathBuf),
}

impl VideoSink {
    pub fn path(&self) -> &Path {
        match self {
            VideoSink::Ffmpeg(p) | VideoSink::PngFrames(p) => p,
        }
    }
}

/// Number of samples visible in each frame: `1, 1 + stride, ...`, always
/// ending with the full series.
pub fn frame_ends(samples: usize, stride: usize) -> Vec<usize> {
    let mut ends: Vec<usize> = (1..=samples).step_by(stride.max(1)).collect();
    if ends.last().is_some_and(|last| *last != samples) {
        ends.push(samples);
    }
    ends
}

struct FrameLayout<'a> {
    width: u32,
    height: u32,
    x_range: (f64, f64),
    y_range: (f64, f64),
    title: &'a str,
    y_label: &'a str,
    text: bool,
}

fn draw_err<E: std::fmt::Debug>(e: E) -> anyhow::Error {
    anyhow!("drawing frame: {e:?}")
}

fn register_font(path: &Path) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("reading font {}", path.display()))?;
    // plotters keeps registered fonts for the rest of the process
    let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
    plotters::style::register_font(FONT_FAMILY, plotters::style::FontStyle::Normal, bytes)
        .map_err(|_| anyhow!("{} is not a usable font", path.display()))
}

fn render_frame(buf: &mut [u8], traces: &[Trace], upto: usize, layout: &FrameLayout) -> Result<()> {
    let root = BitMapBackend::with_buffer(buf, (layout.width, layout.height)).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err)?;

    let mut builder = ChartBuilder::on(&root);
    builder.margin(10);
    if layout.text {
        builder
            .caption(layout.title, (FONT_FAMILY, 20))
            .x_label_area_size(40)
            .y_label_area_size(50);
    }
    let mut chart = builder
        .build_cartesian_2d(
            layout.x_range.0..layout.x_range.1,
            layout.y_range.0..layout.y_range.1,
        )
        .map_err(draw_err)?;

    let mut mesh = chart.configure_mesh();
    mesh.light_line_style(WHITE.mix(0.7));
    if layout.text {
        mesh.x_desc("time (s)")
            .y_desc(layout.y_label)
            .label_style((FONT_FAMILY, 14));
    }
    mesh.draw().map_err(draw_err)?;

    for trace in traces {
        let n = upto.min(trace.len());
        let [r, g, b] = trace.color;
        let style = RGBColor(r, g, b).stroke_width(2);
        let points = trace.times[..n]
            .iter()
            .zip(&trace.values[..n])
            .map(|(t, v)| (*t, *v));
        let series = chart
            .draw_series(LineSeries::new(points, style))
            .map_err(draw_err)?;
        if layout.text {
            series
                .label(trace.label.clone())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
        }
    }
    if layout.text {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .label_font((FONT_FAMILY, 14))
            .draw()
            .map_err(draw_err)?;
    }

    root.present().map_err(draw_err)?;
    Ok(())
}

enum FrameWriter {
    Ffmpeg {
        child: std::process::Child,
        output: PathBuf,
    },
    Png(PathBuf),
}

impl FrameWriter {
    fn open(sink: &VideoSink, settings: &VideoSettings) -> Result<Self> {
        match sink {
            VideoSink::Ffmpeg(output) => {
                let size = format!("{}x{}", settings.width, settings.height);
                let fps = settings.fps.to_string();
                let child = Command::new(&settings.ffmpeg)
                    .args(["-y", "-loglevel", "error"])
                    .args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
                    .args(["-s", size.as_str(), "-r", fps.as_str(), "-i", "-"])
                    .args(["-c:v", settings.codec.as_str(), "-pix_fmt", "yuv420p"])
                    .arg(output)
                    .stdin(Stdio::piped())
                    .stdout(Stdio::null())
                    .stderr(Stdio::piped())
                    .spawn()
                    .with_context(|| format!("starting {}", settings.ffmpeg))?;
                Ok(FrameWriter::Ffmpeg {
                    child,
                    output: output.clone(),
                })
            }
            VideoSink::PngFrames(dir) => {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("creating frame directory {}", dir.display()))?;
                Ok(FrameWriter::Png(dir.clone()))
            }
        }
    }

    fn write(&mut self, index: usize, buf: &[u8], settings: &VideoSettings) -> Result<()> {
        match self {
            FrameWriter::Ffmpeg { child, .. } => {
                let stdin = child
                    .stdin
                    .as_mut()
                    .ok_or_else(|| anyhow!("ffmpeg stdin is closed"))?;
                stdin
                    .write_all(buf)
                    .with_context(|| format!("writing frame {index} to ffmpeg"))
            }
            FrameWriter::Png(dir) => {
                let image = image::RgbImage::from_raw(settings.width, settings.height, buf.to_vec())
                    .ok_or_else(|| anyhow!("frame buffer has the wrong size"))?;
                let path = dir.join(format!("frame_{index:05}.png"));
                image
                    .save(&path)
                    .with_context(|| format!("writing {}", path.display()))
            }
        }
    }

    fn finish(self) -> Result<()> {
        if let FrameWriter::Ffmpeg { mut child, output } = self {
            // closing stdin ends the stream
            drop(child.stdin.take());
            let result = child.wait_with_output().context("waiting for ffmpeg")?;
            if !result.status.success() {
                bail!(
                    "ffmpeg failed ({}) writing {}: {}",
                    result.status,
                    output.display(),
                    String::from_utf8_lossy(&result.stderr).trim()
                );
            }
        }
        Ok(())
    }

    /// Stop after a failed frame. For ffmpeg the process is reaped and its
    /// stderr attached to `err`.
    fn abort(self, err: anyhow::Error) -> anyhow::Error {
        match self {
            FrameWriter::Ffmpeg { mut child, output } => {
                drop(child.stdin.take());
                match child.wait_with_output() {
                    Ok(result) => {
                        let stderr = String::from_utf8_lossy(&result.stderr);
                        let stderr = stderr.trim();
                        if stderr.is_empty() {
                            err.context(format!(
                                "ffmpeg exited ({}) writing {}",
                                result.status,
                                output.display()
                            ))
                        } else {
                            err.context(format!(
                                "ffmpeg failed ({}) writing {}: {stderr}",
                                result.status,
                                output.display()
                            ))
                        }
                    }
                    Err(wait_err) => err.context(format!("waiting for ffmpeg: {wait_err}")),
                }
            }
            FrameWriter::Png(_) => err,
        }
    }
}

/// Render every frame and hand it to `sink`. `progress(done, total)` is
/// called after each frame. Returns the number of frames written.
pub fn encode_video(
    traces: &[Trace],
    settings: &VideoSettings,
    sink: &VideoSink,
    mut progress: impl FnMut(usize, usize),
) -> Result<usize> {
    let samples = traces.iter().map(Trace::len).max().unwrap_or(0);
    if samples == 0 {
        bail!("No rows remain after filtering.");
    }
    if settings.width == 0 || settings.height == 0 {
        bail!("video size must be non-zero");
    }

    let text = match &settings.font {
        Some(path) => {
            register_font(path)?;
            true
        }
        None => {
            log::warn!("No font configured; rendering frames without text");
            false
        }
    };

    let (t0, t1) = traces
        .iter()
        .filter(|t| !t.is_empty())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| {
            (lo.min(t.times[0]), hi.max(t.times[t.len() - 1]))
        });
    let x_range = if t1 > t0 { (t0, t1) } else { (t0 - 0.5, t0 + 0.5) };
    let layout = FrameLayout {
        width: settings.width,
        height: settings.height,
        x_range,
        y_range: settings.y_range,
        title: &settings.title,
        y_label: &settings.y_label,
        text,
    };

    let ends = frame_ends(samples, settings.stride);
    let total = ends.len();
    log::info!(
        "Rendering {total} frames at {} fps to {}",
        settings.fps,
        sink.path().display()
    );

    let mut writer = FrameWriter::open(sink, settings)?;
    let mut buf = vec![0u8; settings.width as usize * settings.height as usize * 3];
    for (index, &upto) in ends.iter().enumerate() {
        let step = render_frame(&mut buf, traces, upto, &layout)
            .and_then(|()| writer.write(index, &buf, settings));
        if let Err(err) = step {
            return Err(writer.abort(err));
        }
        progress(index + 1, total);
    }
    writer.finish()?;

    log::info!("Saved {total} frames to {}", sink.path().display());
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Trace {
        Trace {
            label: "R".to_string(),
            color: [200, 30, 30],
            times: (0..n).map(|i| i as f64 * 0.01).collect(),
            values: (0..n).map(|i| 40.0 + i as f64).collect(),
        }
    }

    #[test]
    fn frame_ends_cover_the_series() {
        assert_eq!(frame_ends(5, 1), vec![1, 2, 3, 4, 5]);
        assert_eq!(frame_ends(5, 2), vec![1, 3, 5]);
        assert_eq!(frame_ends(6, 4), vec![1, 5, 6]);
        assert_eq!(frame_ends(3, 0), vec![1, 2, 3]);
        assert!(frame_ends(0, 1).is_empty());
    }

    #[test]
    fn rendered_frame_contains_the_trace() {
        let layout = FrameLayout {
            width: 64,
            height: 48,
            x_range: (0.0, 0.09),
            y_range: (38.0, 52.0),
            title: "",
            y_label: "",
            text: false,
        };
        let mut buf = vec![0u8; 64 * 48 * 3];
        render_frame(&mut buf, &[ramp(10)], 10, &layout).unwrap();
        let red = buf
            .chunks_exact(3)
            .filter(|px| px[0] > 150 && px[1] < 100 && px[2] < 100)
            .count();
        assert!(red > 10, "{red} red pixels");
    }

    #[test]
    fn png_frames_are_written_with_progress() {
        let dir = std::env::temp_dir().join(format!("flexdms_frames_{}", std::process::id()));
        let settings = VideoSettings {
            width: 32,
            height: 24,
            stride: 2,
            y_range: (38.0, 46.0),
            ..Default::default()
        };
        let mut calls = Vec::new();
        let frames = encode_video(
            &[ramp(5)],
            &settings,
            &VideoSink::PngFrames(dir.clone()),
            |done, total| calls.push((done, total)),
        )
        .unwrap();
        assert_eq!(frames, 3);
        assert_eq!(calls, vec![(1, 3), (2, 3), (3, 3)]);
        assert!(dir.join("frame_00002.png").exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[cfg(unix)]
    #[test]
    fn failing_ffmpeg_reports_its_stderr() {
        use std::os::unix::fs::PermissionsExt;

        let dir = std::env::temp_dir().join(format!("flexdms_ffmpeg_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let script = dir.join("fake-ffmpeg");
        std::fs::write(&script, "#!/bin/sh\necho \"Unknown encoder 'libx264'\" >&2\nexit 1\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let settings = VideoSettings {
            width: 32,
            height: 24,
            ffmpeg: script.display().to_string(),
            ..Default::default()
        };
        let err = encode_video(
            &[ramp(200)],
            &settings,
            &VideoSink::Ffmpeg(dir.join("out.mp4")),
            |_, _| {},
        )
        .unwrap_err();
        let text = format!("{err:#}");
        assert!(text.contains("Unknown encoder 'libx264'"), "{text}");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn empty_traces_are_rejected() {
        let err = encode_video(
            &[],
            &VideoSettings::default(),
            &VideoSink::PngFrames(PathBuf::from("unused")),
            |_, _| {},
        )
        .unwrap_err();
        assert!(err.to_string().contains("No rows remain"));
    }
}
