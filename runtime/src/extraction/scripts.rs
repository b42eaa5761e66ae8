//! Scripts injected into the terminal page.
//!
//! Each script starts with a marker comment so logs (and scripted test
//! contexts) can tell them apart.

use super::{columns, GridSelectors};
use serde::Serialize;

pub const INSTALL_MARKER: &str = "/* pod-alert:install */";
pub const DRAIN_MARKER: &str = "/* pod-alert:drain */";
pub const CLICK_MARKER: &str = "/* pod-alert:click */";
pub const PROBE_MARKER: &str = "/* pod-alert:probe */";

/// Snapshots kept in the page before the oldest are dropped.
pub const MAX_QUEUED_ROWS: usize = 500;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PageConfig<'a> {
    container: &'a str,
    row: &'a str,
    row_id_attr: &'a str,
    column_attr: &'a str,
    columns: &'a [&'a str],
    outcome: &'a str,
    max_queue: usize,
}

fn page_config(selectors: &GridSelectors) -> String {
    let cfg = PageConfig {
        container: &selectors.container,
        row: &selectors.row,
        row_id_attr: &selectors.row_id_attr,
        column_attr: &selectors.column_attr,
        columns: columns::ALL,
        outcome: columns::OUTCOME,
        max_queue: MAX_QUEUED_ROWS,
    };
    serde_json::to_string(&cfg).unwrap_or_else(|_| "{}".to_string())
}

/// Install a `MutationObserver` on the grid container that queues a
/// snapshot of every existing row and every row added later.
///
/// Evaluates to `{installed, fresh, queued}`; `installed` is false when the
/// container is absent. Re-running is a no-op while the observed container
/// is still attached.
pub fn install_observer(selectors: &GridSelectors) -> String {
    format!(
        r#"{INSTALL_MARKER}
(() => {{
    const cfg = {cfg};
    const existing = window.__podAlertObserver;
    if (existing && existing.container && existing.container.isConnected) {{
        return {{ installed: true, fresh: false, queued: existing.queue.length }};
    }}
    const container = document.querySelector(cfg.container);
    if (!container) return {{ installed: false, fresh: false, queued: 0 }};
    if (existing && existing.observer) existing.observer.disconnect();

    const text = (el) => (el && el.textContent ? el.textContent.trim() : '');
    const snapshot = (row) => {{
        const cells = {{}};
        for (const col of cfg.columns) {{
            const cell = row.querySelector('[' + cfg.columnAttr + '="' + col + '"]');
            if (!cell) continue;
            cells[col] = {{
                text: text(cell),
                paragraphs: Array.from(cell.querySelectorAll('p')).map((p) => {{
                    const t = p.querySelector('time');
                    return {{
                        text: text(p),
                        time_title: t ? t.getAttribute('title') : null,
                        time_text: t ? text(t) : null,
                    }};
                }}),
                spans: Array.from(cell.querySelectorAll('span')).map((s) => text(s)),
            }};
        }}
        return {{ row_id: row.getAttribute(cfg.rowIdAttr), cells }};
    }};

    const state = {{ container, queue: [], dropped: 0, observer: null }};
    const push = (row) => {{
        if (state.queue.length >= cfg.maxQueue) {{
            state.queue.shift();
            state.dropped += 1;
        }}
        state.queue.push(snapshot(row));
    }};

    container.querySelectorAll(cfg.row).forEach(push);
    state.observer = new MutationObserver((mutations) => {{
        for (const m of mutations) {{
            if (m.type !== 'childList') continue;
            m.addedNodes.forEach((node) => {{
                if (node.nodeType === Node.ELEMENT_NODE && node.matches && node.matches(cfg.row)) {{
                    push(node);
                }}
            }});
        }}
    }});
    state.observer.observe(container, {{ childList: true, subtree: true }});
    window.__podAlertObserver = state;
    return {{ installed: true, fresh: true, queued: state.queue.length }};
}})()"#,
        cfg = page_config(selectors),
    )
}

/// Take all queued snapshots. Evaluates to `null` when the observer is gone
/// (page reloaded or container replaced), else `{rows, dropped}`.
pub fn drain_queue() -> String {
    format!(
        r#"{DRAIN_MARKER}
(() => {{
    const s = window.__podAlertObserver;
    if (!s || !s.container || !s.container.isConnected) return null;
    const rows = s.queue;
    const dropped = s.dropped;
    s.queue = [];
    s.dropped = 0;
    return {{ rows, dropped }};
}})()"#
    )
}

/// Dispatch a bubbling, cancelable click on a row's outcome cell.
/// Evaluates to `{clicked, reason?}`.
pub fn click_outcome(selectors: &GridSelectors, row_id: &str) -> String {
    let id = serde_json::to_string(row_id).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        r#"{CLICK_MARKER}
(() => {{
    const cfg = {cfg};
    const id = {id};
    const root = document.querySelector(cfg.container) || document;
    const row = Array.from(root.querySelectorAll(cfg.row)).find((r) => r.getAttribute(cfg.rowIdAttr) === id);
    if (!row) return {{ clicked: false, reason: 'row not found' }};
    const cell = row.querySelector('[' + cfg.columnAttr + '="' + cfg.outcome + '"]');
    if (!cell) return {{ clicked: false, reason: 'outcome cell not found' }};
    cell.dispatchEvent(new MouseEvent('click', {{ bubbles: true, cancelable: true }}));
    return {{ clicked: true }};
}})()"#,
        cfg = page_config(selectors),
    )
}

/// Whether an element matching `css` exists.
pub fn probe(css: &str) -> String {
    let css = serde_json::to_string(css).unwrap_or_else(|_| "\"\"".to_string());
    format!("{PROBE_MARKER}\ndocument.querySelector({css}) !== null")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripts_carry_markers() {
        let sel = GridSelectors::default();
        assert!(install_observer(&sel).starts_with(INSTALL_MARKER));
        assert!(drain_queue().starts_with(DRAIN_MARKER));
        assert!(click_outcome(&sel, "1-a").starts_with(CLICK_MARKER));
        assert!(probe(".x").starts_with(PROBE_MARKER));
    }

    #[test]
    fn test_row_id_is_escaped_as_js_string() {
        let script = click_outcome(&GridSelectors::default(), r#"5"-x"#);
        assert!(script.contains(r#"const id = "5\"-x";"#));
    }

    #[test]
    fn test_install_embeds_selectors() {
        let script = install_observer(&GridSelectors::default());
        assert!(script.contains(r#""container":".ag-center-cols-container""#));
        assert!(script.contains(r#""rowIdAttr":"row-id""#));
        assert!(script.contains(r#""columns":["match","alert","rowOutcome","noVigPrice","current"]"#));
    }
}
