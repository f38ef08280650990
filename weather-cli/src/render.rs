//! Plain-text rendering of dashboard snapshots.

use std::fmt::Write;

use chrono::{DateTime, Local, Utc};
use weather_core::{
    CurrentConditions, ForecastSample, IntradayPoint, SessionState, UnitSystem,
};

pub fn render_state(state: &SessionState) -> String {
    let units = state.active_units;
    let mut out = String::new();

    if let Some(current) = &state.current {
        out.push_str(&render_current(current, units));
    }

    let daily = state.daily_summaries();
    if !daily.is_empty() {
        out.push('\n');
        out.push_str(&render_daily(&daily, units));
    }

    let trend = state.intraday_series();
    if !trend.is_empty() {
        out.push('\n');
        out.push_str(&render_trend(&trend, units));
    }

    out
}

pub fn render_current(current: &CurrentConditions, units: UnitSystem) -> String {
    let t = units.temperature_suffix();
    let mut out = String::new();

    let _ = writeln!(out, "{}", current.display_name());
    let _ = writeln!(
        out,
        "  {}°{t}  {}",
        whole(current.temperature),
        capitalize(&current.condition.description)
    );
    let _ = writeln!(out, "  Feels like  {}°{t}", whole(current.feels_like));
    let _ = writeln!(
        out,
        "  High / Low  {}°{t} / {}°{t}",
        whole(current.temp_max),
        whole(current.temp_min)
    );
    let _ = writeln!(out, "  Humidity    {}%", current.humidity_pct);
    let _ = writeln!(out, "  Pressure    {} hPa", current.pressure_hpa);
    let _ = writeln!(
        out,
        "  Wind        {} {}",
        current.wind_speed,
        units.wind_speed_label()
    );
    if let Some(visibility) = current.visibility_m {
        let _ = writeln!(out, "  Visibility  {:.1} km", f64::from(visibility) / 1000.0);
    }
    let _ = writeln!(out, "  Sunrise     {}", clock(current.sunrise));
    let _ = writeln!(out, "  Sunset      {}", clock(current.sunset));

    out
}

pub fn render_daily(days: &[ForecastSample], units: UnitSystem) -> String {
    let t = units.temperature_suffix();
    let mut out = String::from("5-Day Forecast\n");

    for day in days {
        let _ = writeln!(
            out,
            "  {:<12} {:>4}°{t}  ↑{}° ↓{}°  {}",
            day.timestamp.with_timezone(&Local).format("%a, %b %-d"),
            whole(day.temperature),
            whole(day.temp_max),
            whole(day.temp_min),
            day.description
        );
    }

    out
}

pub fn render_trend(points: &[IntradayPoint], units: UnitSystem) -> String {
    let mut out = String::from("Temperature & Humidity Trends\n");
    let _ = writeln!(
        out,
        "  {:<9} {:>6}  {:>8}",
        "Time",
        format!("°{}", units.temperature_suffix()),
        "Humidity"
    );

    for point in points {
        let _ = writeln!(
            out,
            "  {:<9} {:>6}  {:>7}%  {}",
            point.label,
            point.temperature,
            point.humidity_pct,
            "▮".repeat(usize::from(point.humidity_pct / 10))
        );
    }

    out
}

/// Nearest whole degree. Integer formatting keeps values just below zero
/// from printing as "-0".
fn whole(value: f64) -> i64 {
    value.round() as i64
}

fn clock(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%I:%M %p").to_string()
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
