use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::{Column, TableBuilder};
use egui_plot::{Bar, BarChart, HLine, Legend, Line, Plot, PlotPoints, Points, VLine};

use flexdms_lab::analysis::calibration::SweepCalibration;
use flexdms_lab::analysis::diagnostics::ColumnDiagnostics;
use flexdms_lab::analysis::signal::linspace;
use flexdms_lab::analysis::sweep::Direction;
use flexdms_lab::report;

use super::color32;
use crate::state::{AppState, Tab};

const UP_COLOR: Color32 = Color32::from_rgb(230, 85, 13);
const DOWN_COLOR: Color32 = Color32::from_rgb(49, 130, 189);
const CURVE_POINTS: usize = 200;

fn direction_color(direction: Direction) -> Color32 {
    match direction {
        Direction::Up => UP_COLOR,
        Direction::Down => DOWN_COLOR,
    }
}

fn placeholder(ui: &mut Ui, text: &str) {
    ui.centered_and_justified(|ui: &mut Ui| {
        ui.heading(text);
    });
}

// ---------------------------------------------------------------------------
// Central panel dispatch
// ---------------------------------------------------------------------------

/// Render the view for the selected tab.
pub fn central_view(ui: &mut Ui, state: &mut AppState) {
    match state.tab {
        Tab::Resistance => resistance_plot(ui, state),
        Tab::Calibration => calibration_plot(ui, state),
        Tab::Prediction => prediction_plot(ui, state),
        Tab::Diagnostics => diagnostics_view(ui, state),
        Tab::Threshold => threshold_plot(ui, state),
        Tab::Playback => playback_view(ui, state),
    }
}

// ---------------------------------------------------------------------------
// Resistance
// ---------------------------------------------------------------------------

fn resistance_plot(ui: &mut Ui, state: &AppState) {
    let Some(run) = &state.resistance else {
        placeholder(ui, "Open a sensor log  (File → Open log…)");
        return;
    };
    if run.is_empty() {
        placeholder(ui, "No rows remain after filtering.");
        return;
    }

    let channel = run.filter.channel;
    let color = color32(state.colors.color_for(channel));
    Plot::new("resistance_plot")
        .legend(Legend::default())
        .x_axis_label("Time (s)")
        .y_axis_label(channel.label())
        .show(ui, |plot_ui| {
            plot_ui.line(
                Line::new(PlotPoints::from(run.series.points(channel)))
                    .name(channel.label())
                    .color(color)
                    .width(1.5),
            );
        });
}

// ---------------------------------------------------------------------------
// Calibration fit
// ---------------------------------------------------------------------------

fn fitted_curve(cal: &SweepCalibration, direction: Direction) -> Vec<[f64; 2]> {
    let branch = cal.branch(direction);
    let (lo, hi) = branch.feature_range;
    linspace(lo, hi, CURVE_POINTS)
        .into_iter()
        .map(|x| [x, branch.poly.eval(x)])
        .collect()
}

fn calibration_plot(ui: &mut Ui, state: &AppState) {
    let Some(run) = &state.calibration else {
        placeholder(ui, "Open a calibration table or model");
        return;
    };
    let cal = &run.calibration;

    ui.horizontal_wrapped(|ui: &mut Ui| {
        for direction in [Direction::Up, Direction::Down] {
            let branch = cal.branch(direction);
            let mut text = format!("{direction}: {}", branch.poly);
            if let Some(mse) = branch.cv_mse {
                text.push_str(&format!("   (CV MSE {mse:.5})"));
            }
            ui.label(RichText::new(text).color(direction_color(direction)).monospace());
        }
    });
    ui.separator();

    Plot::new("calibration_plot")
        .legend(Legend::default())
        .x_axis_label(format!("{:?} resistance", cal.feature))
        .y_axis_label("Angle (rad)")
        .show(ui, |plot_ui| {
            for direction in [Direction::Up, Direction::Down] {
                let color = direction_color(direction);
                if let Some(training) = &run.training {
                    plot_ui.points(
                        Points::new(PlotPoints::from(training.branch_points(direction)))
                            .name(format!("{direction} samples"))
                            .color(color.gamma_multiply(0.5))
                            .radius(2.0),
                    );
                }
                plot_ui.line(
                    Line::new(PlotPoints::from(fitted_curve(cal, direction)))
                        .name(format!("{direction} fit"))
                        .color(color)
                        .width(2.0),
                );
            }
        });
}

// ---------------------------------------------------------------------------
// Angle prediction
// ---------------------------------------------------------------------------

fn prediction_plot(ui: &mut Ui, state: &AppState) {
    let test = state.calibration.as_ref().and_then(|run| run.test.as_ref());
    let Some(test) = test else {
        placeholder(ui, "Open a calibration and a sensor log to predict angles");
        return;
    };
    let Some(prediction) = &test.prediction else {
        let text = match &test.failure {
            Some(reason) => format!("No angle prediction: {reason}"),
            None => "No rows remain after filtering.".to_string(),
        };
        placeholder(ui, &text);
        return;
    };

    let times = &test.run.series.times;
    let mut up = Vec::new();
    let mut down = Vec::new();
    for ((t, angle), direction) in times.iter().zip(&prediction.angles).zip(&prediction.directions) {
        match direction {
            Direction::Up => up.push([*t, *angle]),
            Direction::Down => down.push([*t, *angle]),
        }
    }
    let all: Vec<[f64; 2]> = times
        .iter()
        .zip(&prediction.angles)
        .map(|(t, a)| [*t, *a])
        .collect();

    Plot::new("prediction_plot")
        .legend(Legend::default())
        .x_axis_label("Time (s)")
        .y_axis_label("Predicted angle (rad)")
        .show(ui, |plot_ui| {
            plot_ui.line(
                Line::new(PlotPoints::from(all))
                    .name("angle")
                    .color(Color32::GRAY)
                    .width(1.0),
            );
            plot_ui.points(
                Points::new(PlotPoints::from(up))
                    .name("up sweep")
                    .color(UP_COLOR)
                    .radius(2.0),
            );
            plot_ui.points(
                Points::new(PlotPoints::from(down))
                    .name("down sweep")
                    .color(DOWN_COLOR)
                    .radius(2.0),
            );
        });
}

// ---------------------------------------------------------------------------
// Distribution diagnostics
// ---------------------------------------------------------------------------

fn diagnostics_view(ui: &mut Ui, state: &AppState) {
    let Some(run) = &state.diagnostics else {
        placeholder(ui, "Open a table  (File → Open table…)");
        return;
    };

    ScrollArea::vertical().show(ui, |ui: &mut Ui| {
        summary_table(ui, &run.columns, run.alpha);
        ui.add_space(8.0);
        ui.label(RichText::new(report::diagnostics(run)).monospace());
        ui.separator();

        for col in &run.columns {
            ui.label(RichText::new(&col.column).strong());
            ui.columns(2, |cols| {
                histogram_plot(&mut cols[0], col);
                qq_plot(&mut cols[1], col);
            });
            ui.add_space(8.0);
        }
    });
}

fn summary_table(ui: &mut Ui, columns: &[ColumnDiagnostics], alpha: f64) {
    TableBuilder::new(ui)
        .striped(true)
        .vscroll(false)
        .column(Column::auto())
        .columns(Column::remainder(), 4)
        .header(20.0, |mut header| {
            for title in ["Column", "n", "W", "p-value", "Normal"] {
                header.col(|ui: &mut Ui| {
                    ui.strong(title);
                });
            }
        })
        .body(|mut body| {
            for col in columns {
                body.row(18.0, |mut row| {
                    row.col(|ui: &mut Ui| {
                        ui.label(&col.column);
                    });
                    row.col(|ui: &mut Ui| {
                        ui.label(col.samples.to_string());
                    });
                    let (w, p, normal) = match &col.shapiro {
                        Some(sw) => (
                            format!("{:.4}", sw.w),
                            format!("{:.4}", sw.p_value),
                            if sw.p_value > alpha { "yes" } else { "no" },
                        ),
                        None => ("–".into(), "–".into(), "–"),
                    };
                    row.col(|ui: &mut Ui| {
                        ui.label(w);
                    });
                    row.col(|ui: &mut Ui| {
                        if col.shapiro_is_approximate() {
                            ui.label(format!("{p} (approx.)"))
                                .on_hover_text("p-value may be inaccurate for N > 5000");
                        } else {
                            ui.label(p);
                        }
                    });
                    row.col(|ui: &mut Ui| {
                        ui.label(normal);
                    });
                });
            }
        });
}

fn histogram_plot(ui: &mut Ui, col: &ColumnDiagnostics) {
    let Some(hist) = &col.histogram else {
        ui.label("Not enough data for a histogram");
        return;
    };
    let width = hist.bin_width();
    let bars: Vec<Bar> = hist
        .bars()
        .map(|(centre, count)| Bar::new(centre, count as f64).width(width))
        .collect();

    Plot::new(format!("hist_{}", col.column))
        .height(220.0)
        .x_axis_label(col.column.as_str())
        .y_axis_label("Count")
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars).color(Color32::LIGHT_BLUE));
        });
}

fn qq_plot(ui: &mut Ui, col: &ColumnDiagnostics) {
    let Some(qq) = &col.qq else {
        ui.label("Not enough data for a Q-Q plot");
        return;
    };
    let points: Vec<[f64; 2]> = qq
        .theoretical
        .iter()
        .zip(&qq.sample)
        .map(|(x, y)| [*x, *y])
        .collect();
    let reference: Vec<[f64; 2]> = match (qq.theoretical.first(), qq.theoretical.last()) {
        (Some(&lo), Some(&hi)) => vec![
            [lo, qq.intercept + qq.slope * lo],
            [hi, qq.intercept + qq.slope * hi],
        ],
        _ => Vec::new(),
    };

    Plot::new(format!("qq_{}", col.column))
        .height(220.0)
        .x_axis_label("Theoretical quantiles")
        .y_axis_label("Ordered values")
        .show(ui, |plot_ui| {
            plot_ui.points(Points::new(PlotPoints::from(points)).radius(2.0));
            plot_ui.line(Line::new(PlotPoints::from(reference)).color(Color32::RED));
        });
}

// ---------------------------------------------------------------------------
// Threshold duration
// ---------------------------------------------------------------------------

fn threshold_plot(ui: &mut Ui, state: &AppState) {
    let Some(run) = &state.threshold else {
        placeholder(ui, "Open a sensor log  (File → Open log…)");
        return;
    };
    if run.run.is_empty() {
        placeholder(ui, "No rows remain after filtering.");
        return;
    }

    ui.label(RichText::new(report::threshold(run)).monospace());
    ui.separator();

    let channel = run.run.filter.channel;
    let values = run.run.series.channel(channel);
    let window = run
        .span
        .as_ref()
        .map(|span| span.window_points(&run.run.series.times, &values));

    Plot::new("threshold_plot")
        .legend(Legend::default())
        .x_axis_label("Time (s)")
        .y_axis_label(channel.label())
        .show(ui, |plot_ui| {
            plot_ui.line(
                Line::new(PlotPoints::from(run.run.series.points(channel)))
                    .name(channel.label())
                    .color(color32(state.colors.color_for(channel)))
                    .width(1.5),
            );
            plot_ui.hline(
                HLine::new(run.threshold)
                    .name(format!("threshold {}", run.threshold))
                    .color(Color32::RED),
            );
            if let (Some(span), Some(window)) = (&run.span, window) {
                plot_ui.line(
                    Line::new(PlotPoints::from(window))
                        .name("above threshold")
                        .color(Color32::GOLD)
                        .width(2.5),
                );
                plot_ui.vline(VLine::new(span.start_time).color(Color32::DARK_GREEN));
                plot_ui.vline(VLine::new(span.end_time).color(Color32::DARK_GREEN));
            }
        });
}

// ---------------------------------------------------------------------------
// Playback
// ---------------------------------------------------------------------------

fn playback_view(ui: &mut Ui, state: &mut AppState) {
    let Some(run) = &state.playback else {
        placeholder(ui, "Open a sensor log  (File → Open log…)");
        return;
    };
    let total = run.traces.iter().map(|t| t.len()).max().unwrap_or(0);
    if total == 0 {
        placeholder(ui, "No rows remain after filtering.");
        return;
    }

    let player = &mut state.player;
    ui.horizontal(|ui: &mut Ui| {
        let label = if player.playing { "Pause" } else { "Play" };
        if ui.button(label).clicked() {
            if !player.playing && player.visible(total) >= total {
                player.rewind();
            }
            player.playing = !player.playing;
        }
        if ui.button("Rewind").clicked() {
            player.rewind();
        }
        ui.add(
            egui::Slider::new(&mut player.speed, 1.0..=1000.0)
                .logarithmic(true)
                .text("samples/s"),
        );
        ui.label(format!("{} / {total}", player.visible(total)));
    });

    let shown = player.visible(total).max(1);
    let (lower, upper) = (run.run.filter.lower, run.run.filter.upper);
    let (t0, t1) = run.run.series.time_span().unwrap_or((0.0, 1.0));

    Plot::new("playback_plot")
        .legend(Legend::default())
        .x_axis_label("Time (s)")
        .y_axis_label("Filtered Value")
        .include_x(t0)
        .include_x(t1)
        .include_y(lower)
        .include_y(upper)
        .allow_drag(false)
        .allow_zoom(false)
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            for trace in &run.traces {
                let n = shown.min(trace.len());
                let points: PlotPoints = trace.times[..n]
                    .iter()
                    .zip(&trace.values[..n])
                    .map(|(t, v)| [*t, *v])
                    .collect();
                plot_ui.line(
                    Line::new(points)
                        .name(&trace.label)
                        .color(color32(trace.color))
                        .width(1.5),
                );
            }
        });

    if state.player.playing {
        ui.ctx().request_repaint();
    }
}
