// src/services/charts.rs
//! Declarative Plotly figures. The browser renders them with plotly.js; this
//! module only decides chart type, axis mapping, colors and ticks.

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::models::{DateTable, FedFuturesPoint, IndexPrices};
use crate::services::transform::{
    assign_dual_axis, Axis, SnapshotOffset, YieldCurveSnapshot, TENOR_YEARS,
};

pub const TEMPLATE: &str = "plotly_dark";
const FALLBACK_COLOR: &str = "#9e9e9e";

pub const TENOR_COLORS: &[(&str, &str)] = &[
    ("US1M", "#8ecae6"),
    ("US3M", "#219ebc"),
    ("US6M", "#126782"),
    ("US1Y", "#ffb703"),
    ("US2Y", "#fb8500"),
    ("US5Y", "#e63946"),
    ("US10Y", "#a8dadc"),
    ("US20Y", "#8338ec"),
    ("US30Y", "#3a86ff"),
];

pub const OFFSET_COLORS: &[(&str, &str)] = &[
    ("Latest", "#ef553b"),
    ("1 Week Ago", "#636efa"),
    ("1 Month Ago", "#00cc96"),
    ("1 Year Ago", "#ab63fa"),
];

pub const SPREAD_COLORS: &[(&str, &str)] = &[
    ("High Yield", "#ef553b"),
    ("BBB", "#636efa"),
    ("AAA", "#00cc96"),
];

const IMPLIED_RATE_COLOR: &str = "#636efa";
const CUTS_COLOR: &str = "#ffa15a";
const CANDLE_COLUMNS: usize = 2;

#[derive(Debug, Clone, Serialize)]
pub struct Figure {
    pub data: Vec<Value>,
    pub layout: Value,
}

pub fn color_for<'a>(name: &str, palette: &[(&str, &'a str)]) -> &'a str {
    palette
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, c)| *c)
        .unwrap_or(FALLBACK_COLOR)
}

fn base_layout(title: &str) -> Map<String, Value> {
    let mut layout = Map::new();
    layout.insert("title".into(), json!({ "text": title }));
    layout.insert("template".into(), json!(TEMPLATE));
    layout.insert("hovermode".into(), json!("x unified"));
    layout.insert("legend".into(), json!({ "orientation": "h", "y": -0.2 }));
    layout
}

fn date_strings(table: &DateTable) -> Vec<String> {
    table.dates.iter().map(|d| d.to_string()).collect()
}

pub fn yield_time_series_figure(series: &DateTable) -> Figure {
    let x = date_strings(series);
    let data = series
        .columns
        .iter()
        .map(|col| {
            json!({
                "type": "scatter",
                "mode": "lines",
                "name": col.name,
                "x": x,
                "y": col.values,
                "line": { "color": color_for(&col.name, TENOR_COLORS) },
            })
        })
        .collect();

    let mut layout = base_layout("US Treasury Yields: Time Series");
    layout.insert("xaxis".into(), json!({ "title": { "text": "Date" } }));
    layout.insert("yaxis".into(), json!({ "title": { "text": "Yield (%)" } }));
    Figure {
        data,
        layout: Value::Object(layout),
    }
}

/// Lines with markers per offset, x placed at maturity years and labelled
/// with the tenor names.
pub fn yield_curve_figure(snapshot: &YieldCurveSnapshot) -> Figure {
    let data = SnapshotOffset::ALL
        .iter()
        .map(|offset| {
            let (x, y, tenors): (Vec<_>, Vec<_>, Vec<_>) = snapshot
                .points_for(*offset)
                .filter_map(|p| p.years.map(|yrs| (yrs, p.yield_pct, p.tenor.clone())))
                .fold((Vec::new(), Vec::new(), Vec::new()), |mut acc, (x, y, t)| {
                    acc.0.push(x);
                    acc.1.push(y);
                    acc.2.push(t);
                    acc
                });
            let name = match snapshot.date_of(*offset) {
                Some(date) => format!("{} ({})", offset.label(), date),
                None => offset.label().to_string(),
            };
            json!({
                "type": "scatter",
                "mode": "lines+markers",
                "name": name,
                "x": x,
                "y": y,
                "customdata": tenors,
                "hovertemplate": "%{customdata}: %{y:.2f}%<extra></extra>",
                "line": { "color": color_for(offset.label(), OFFSET_COLORS) },
            })
        })
        .collect();

    let tickvals: Vec<f64> = TENOR_YEARS.iter().map(|(_, y)| *y).collect();
    let ticktext: Vec<&str> = TENOR_YEARS.iter().map(|(t, _)| *t).collect();

    let mut layout = base_layout("US Yield Curve Evolution (Latest vs 1W vs 1M vs 1Y)");
    layout.insert(
        "xaxis".into(),
        json!({
            "title": { "text": "Maturity" },
            "tickmode": "array",
            "tickvals": tickvals,
            "ticktext": ticktext,
        }),
    );
    layout.insert("yaxis".into(), json!({ "title": { "text": "Yield (%)" } }));
    layout.insert("hovermode".into(), json!("closest"));
    Figure {
        data,
        layout: Value::Object(layout),
    }
}

/// Expects spreads already converted to basis points.
pub fn credit_spread_figure(spreads_bps: &DateTable) -> Figure {
    let x = date_strings(spreads_bps);
    let data = spreads_bps
        .columns
        .iter()
        .map(|col| {
            let yaxis = match assign_dual_axis(&col.name) {
                Axis::Primary => "y",
                Axis::Secondary => "y2",
            };
            json!({
                "type": "scatter",
                "mode": "lines",
                "name": col.name,
                "x": x,
                "y": col.values,
                "yaxis": yaxis,
                "line": { "color": color_for(&col.name, SPREAD_COLORS) },
            })
        })
        .collect();

    let mut layout = base_layout("Corporate Credit Spreads (OAS, bps)");
    layout.insert("yaxis".into(), json!({ "title": { "text": "High Yield OAS (bps)" } }));
    layout.insert(
        "yaxis2".into(),
        json!({
            "title": { "text": "Investment Grade OAS (bps)" },
            "overlaying": "y",
            "side": "right",
            "showgrid": false,
        }),
    );
    Figure {
        data,
        layout: Value::Object(layout),
    }
}

/// Bars for the implied rate on the left axis, a line for cumulative cuts on
/// the right.
pub fn fed_futures_figure(points: &[FedFuturesPoint]) -> Figure {
    let months: Vec<String> = points
        .iter()
        .map(|p| p.contract_month.format("%b %Y").to_string())
        .collect();
    let implied: Vec<f64> = points.iter().map(|p| p.implied_rate).collect();
    let cuts: Vec<f64> = points.iter().map(|p| p.cuts_priced_in).collect();

    let data = vec![
        json!({
            "type": "bar",
            "name": "Implied Rate (%)",
            "x": months,
            "y": implied,
            "yaxis": "y",
            "marker": { "color": IMPLIED_RATE_COLOR },
        }),
        json!({
            "type": "scatter",
            "mode": "lines+markers",
            "name": "Cuts Priced In",
            "x": months,
            "y": cuts,
            "yaxis": "y2",
            "line": { "color": CUTS_COLOR },
        }),
    ];

    let mut layout = base_layout("Fed Funds Futures: Implied Rate Path");
    layout.insert("yaxis".into(), json!({ "title": { "text": "Implied Rate (%)" } }));
    layout.insert(
        "yaxis2".into(),
        json!({
            "title": { "text": "Cumulative 25bp Cuts" },
            "overlaying": "y",
            "side": "right",
            "showgrid": false,
        }),
    );
    Figure {
        data,
        layout: Value::Object(layout),
    }
}

fn axis_suffix(idx: usize) -> String {
    if idx == 0 {
        String::new()
    } else {
        (idx + 1).to_string()
    }
}

/// One candlestick subplot per ticker on a two-column grid.
pub fn index_candlestick_figure(prices: &IndexPrices) -> Figure {
    let rows = prices.series.len().div_ceil(CANDLE_COLUMNS).max(1);
    let mut data = Vec::with_capacity(prices.series.len());
    let mut layout = base_layout("Market Watchlist (1Y Daily)");
    layout.insert(
        "grid".into(),
        json!({ "rows": rows, "columns": CANDLE_COLUMNS, "pattern": "independent" }),
    );
    layout.insert("height".into(), json!(rows * 320));
    layout.insert("showlegend".into(), json!(false));
    layout.insert("hovermode".into(), json!("closest"));

    let mut annotations = Vec::with_capacity(prices.series.len());
    for (idx, series) in prices.series.iter().enumerate() {
        let suffix = axis_suffix(idx);
        data.push(json!({
            "type": "candlestick",
            "name": series.label,
            "x": series.bars.iter().map(|b| b.date.to_string()).collect::<Vec<_>>(),
            "open": series.bars.iter().map(|b| b.open).collect::<Vec<_>>(),
            "high": series.bars.iter().map(|b| b.high).collect::<Vec<_>>(),
            "low": series.bars.iter().map(|b| b.low).collect::<Vec<_>>(),
            "close": series.bars.iter().map(|b| b.close).collect::<Vec<_>>(),
            "xaxis": format!("x{}", suffix),
            "yaxis": format!("y{}", suffix),
        }));
        layout.insert(
            format!("xaxis{}", suffix),
            json!({ "rangeslider": { "visible": false } }),
        );
        annotations.push(json!({
            "text": format!("{} ({})", series.label, series.ticker),
            "xref": format!("x{} domain", suffix),
            "yref": format!("y{} domain", suffix),
            "x": 0.0,
            "y": 1.12,
            "showarrow": false,
        }));
    }
    layout.insert("annotations".into(), Value::Array(annotations));

    Figure {
        data,
        layout: Value::Object(layout),
    }
}
