// src/services/page.rs
//! Server-side HTML for the single dashboard page.

use std::fmt::Write;

use crate::models::{EarningsEvent, EconomicRelease};
use crate::services::charts::Figure;
use crate::services::dashboard::{DashboardView, FailureKind, Section};
use crate::services::session::{AuthState, Controls};

pub const TITLE: &str = "FBU Macro Dashboard";
const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.32.0.min.js";

const STYLE: &str = r#"
body { margin: 0; font-family: -apple-system, "Segoe UI", Roboto, sans-serif; background: #0e1117; color: #fafafa; }
.layout { display: flex; min-height: 100vh; }
aside { width: 280px; padding: 1.5rem; background: #262730; box-sizing: border-box; }
main { flex: 1; padding: 1.5rem 2rem; min-width: 0; }
.login { max-width: 360px; margin: 15vh auto; }
input, select, button { width: 100%; padding: .5rem; margin: .25rem 0 .75rem; border-radius: 6px; border: 1px solid #555; background: #0e1117; color: #fafafa; box-sizing: border-box; }
button { cursor: pointer; background: #ff4b4b; border: none; }
.tabs button { width: auto; background: transparent; border-bottom: 2px solid transparent; border-radius: 0; margin-right: 1rem; }
.tabs button.active { border-bottom-color: #ff4b4b; }
.tab { display: none; } .tab.active { display: block; }
.notice { padding: .75rem 1rem; border-radius: 6px; margin: .5rem 0; }
.notice.info { background: #172d43; } .notice.error { background: #3e2327; } .notice.auth { background: #3e3a23; }
table { border-collapse: collapse; width: 100%; margin: .5rem 0 1.5rem; }
th, td { text-align: left; padding: .4rem .6rem; border-bottom: 1px solid #333; }
.caption { color: #9e9e9e; font-size: .85rem; }
hr { border: none; border-top: 1px solid #444; }
"#;

const TAB_SCRIPT: &str = r#"
function showTab(id) {
  document.querySelectorAll('.tab').forEach(t => t.classList.toggle('active', t.id === id));
  document.querySelectorAll('.tabs button').forEach(b => b.classList.toggle('active', b.dataset.tab === id));
  document.querySelectorAll('#' + id + ' .js-plotly-plot').forEach(p => Plotly.Plots.resize(p));
}
"#;

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn document(body: &str, with_plotly: bool) -> String {
    let plotly = if with_plotly {
        format!(r#"<script src="{}"></script>"#, PLOTLY_CDN)
    } else {
        String::new()
    };
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"utf-8\">\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
         <title>{title}</title>{plotly}<style>{style}</style></head><body>{body}</body></html>",
        title = TITLE,
        plotly = plotly,
        style = STYLE,
        body = body,
    )
}

/// Credential prompt, with the error line when the last attempt failed.
pub fn render_login(state: AuthState) -> String {
    let error = if state == AuthState::AuthFailed {
        r#"<div class="notice error">Password incorrect</div>"#
    } else {
        ""
    };
    let body = format!(
        r#"<div class="login"><h1>{title}</h1>
<form method="post" action="/login">
<label for="password">Password</label>
<input id="password" name="password" type="password" autocomplete="current-password" autofocus>
<button type="submit">Log in</button>
</form>{error}</div>"#,
        title = TITLE,
        error = error,
    );
    document(&body, false)
}

fn notice<T>(section: &Section<T>) -> Option<String> {
    match section {
        Section::Ready { .. } => None,
        Section::Empty { message } => Some(format!(
            r#"<div class="notice info">{}</div>"#,
            escape_html(message)
        )),
        Section::Failed { kind, message } => {
            let class = match kind {
                FailureKind::ProviderAuth => "auth",
                FailureKind::ProviderFetch => "error",
            };
            Some(format!(
                r#"<div class="notice {}">{}</div>"#,
                class,
                escape_html(message)
            ))
        }
    }
}

/// Figure JSON is embedded in a script tag, so `</` must not survive.
fn plot(id: &str, figure: &Figure) -> String {
    let json = serde_json::to_string(figure)
        .unwrap_or_else(|_| r#"{"data":[],"layout":{}}"#.to_string())
        .replace("</", "<\\/");
    format!(
        r#"<div id="{id}"></div><script>(function(){{var f={json};Plotly.newPlot("{id}",f.data,f.layout,{{responsive:true}});}})();</script>"#,
        id = id,
        json = json,
    )
}

fn fmt_opt(value: Option<f64>, suffix: &str) -> String {
    value
        .map(|v| format!("{:.2}{}", v, suffix))
        .unwrap_or_else(|| "-".to_string())
}

fn releases_table(releases: &[EconomicRelease]) -> String {
    let mut rows = String::new();
    for r in releases {
        let _ = write!(
            rows,
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            r.date.format("%a %b %-d, %Y"),
            escape_html(&r.release_name),
            r.release_id
        );
    }
    format!(
        "<table><thead><tr><th>Date</th><th>Release</th><th>ID</th></tr></thead><tbody>{}</tbody></table>",
        rows
    )
}

fn earnings_table(events: &[EarningsEvent]) -> String {
    let mut rows = String::new();
    for e in events {
        let _ = write!(
            rows,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            e.earnings_date.format("%a %b %-d"),
            escape_html(&e.symbol),
            escape_html(&e.company),
            escape_html(&e.event_name),
            fmt_opt(e.eps_estimate, ""),
            fmt_opt(e.reported_eps, ""),
            fmt_opt(e.surprise_pct, "%"),
        );
    }
    format!(
        "<table><thead><tr><th>Date</th><th>Symbol</th><th>Company</th><th>Event</th>\
         <th>EPS Est.</th><th>Reported EPS</th><th>Surprise</th></tr></thead><tbody>{}</tbody></table>",
        rows
    )
}

fn sidebar(controls: &Controls, recent: &[EconomicRelease]) -> String {
    let selected = |flag: bool| if flag { " selected" } else { "" };
    let mut out = format!(
        r#"<form method="post" action="/logout"><button type="submit">Logout</button></form>
<h3>Controls</h3>
<form method="get" action="/">
<label for="lookback_days">Yield lookback (days): {lookback}</label>
<input id="lookback_days" name="lookback_days" type="range" min="{lmin}" max="{lmax}" step="30" value="{lookback}">
<label for="days_ahead">Calendar days ahead</label>
<input id="days_ahead" name="days_ahead" type="number" min="{dmin}" max="{dmax}" value="{days}">
<label for="only_important">Releases</label>
<select id="only_important" name="only_important">
<option value="true"{imp}>High impact only</option>
<option value="false"{all}>All releases</option>
</select>
<button type="submit">Apply</button>
</form>
<h3>Recent Economic Releases</h3>"#,
        lookback = controls.lookback_days,
        lmin = Controls::LOOKBACK_RANGE.0,
        lmax = Controls::LOOKBACK_RANGE.1,
        dmin = Controls::DAYS_AHEAD_RANGE.0,
        dmax = Controls::DAYS_AHEAD_RANGE.1,
        days = controls.days_ahead,
        imp = selected(controls.only_important),
        all = selected(!controls.only_important),
    );
    if recent.is_empty() {
        out.push_str(r#"<p class="caption">No releases in the past week.</p>"#);
    }
    for r in recent {
        let _ = write!(
            out,
            r#"<p><strong>{}</strong><br><span class="caption">Released on: {}</span></p><hr>"#,
            escape_html(&r.release_name),
            r.date
        );
    }
    out
}

fn tab(id: &str, active: bool, content: String) -> String {
    format!(
        r#"<section id="{}" class="tab{}">{}</section>"#,
        id,
        if active { " active" } else { "" },
        content
    )
}

pub fn render_dashboard(view: &DashboardView) -> String {
    let mut rates = String::new();
    match view.rates.data() {
        Some(panel) => {
            rates.push_str(&plot("fig-yields", &panel.time_series));
            match &panel.curve {
                Some(curve) => rates.push_str(&plot("fig-curve", curve)),
                None => rates.push_str(r#"<div class="notice info">Not enough data for a curve snapshot.</div>"#),
            }
        }
        None => rates.extend(notice(&view.rates)),
    }

    let credit = match view.credit.data() {
        Some(fig) => plot("fig-credit", fig),
        None => notice(&view.credit).unwrap_or_default(),
    };

    let futures = match view.fed_futures.data() {
        Some(panel) => plot("fig-futures", &panel.figure),
        None => notice(&view.fed_futures).unwrap_or_default(),
    };

    let markets = match view.markets.data() {
        Some(fig) => plot("fig-markets", fig),
        None => notice(&view.markets).unwrap_or_default(),
    };

    let mut calendar = String::from("<h2>Upcoming Economic Releases</h2>");
    match view.upcoming_releases.data() {
        Some(releases) => calendar.push_str(&releases_table(releases)),
        None => calendar.extend(notice(&view.upcoming_releases)),
    }
    calendar.push_str("<h2>Earnings This Week</h2>");
    match view.earnings.data() {
        Some(events) => calendar.push_str(&earnings_table(events)),
        None => calendar.extend(notice(&view.earnings)),
    }

    let tabs = [
        ("tab-rates", "Rates", rates),
        ("tab-credit", "Credit", credit),
        ("tab-futures", "Fed Futures", futures),
        ("tab-markets", "Markets", markets),
        ("tab-calendar", "Calendar", calendar),
    ];
    let mut nav = String::from(r#"<nav class="tabs">"#);
    let mut sections = String::new();
    for (i, (id, label, content)) in tabs.into_iter().enumerate() {
        let _ = write!(
            nav,
            r#"<button type="button" data-tab="{id}" class="{cls}" onclick="showTab('{id}')">{label}</button>"#,
            id = id,
            cls = if i == 0 { "active" } else { "" },
            label = label,
        );
        sections.push_str(&tab(id, i == 0, content));
    }
    nav.push_str("</nav>");

    let body = format!(
        r#"<div class="layout"><aside>{sidebar}</aside><main><h1>{title}</h1>
<p class="caption">As of {as_of}</p>{nav}{sections}</main></div><script>{script}</script>"#,
        sidebar = sidebar(&view.controls, &view.recent_releases),
        title = TITLE,
        as_of = view.as_of,
        nav = nav,
        sections = sections,
        script = TAB_SCRIPT,
    );
    document(&body, true)
}
