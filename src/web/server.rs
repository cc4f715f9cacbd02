use axum::{
    response::Html,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::{api, AppState};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Dashboard page
        .route("/", get(serve_dashboard))
        // API endpoints
        .route("/api/health", get(api::health_check))
        .route("/api/trading-data", get(api::get_trading_data))
        .route("/api/predict-profit", post(api::post_predict_profit))
        // Notification endpoints
        .route("/api/notifications", get(api::get_notifications))
        .route("/api/notifications/clear", post(api::post_clear_notifications))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn start_dashboard_server(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Dashboard server starting on http://localhost:{}", port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

const DASHBOARD_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Starshot Dashboard</title>
    <script src="https://cdn.jsdelivr.net/npm/chart.js"></script>
    <style>
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, Ubuntu, sans-serif;
            background: #0f1419;
            color: #e7e9ea;
            min-height: 100vh;
        }
        .header {
            background: #16202a;
            padding: 1rem 2rem;
            border-bottom: 1px solid #2f3336;
            display: flex;
            justify-content: space-between;
            align-items: center;
            gap: 2rem;
            position: sticky;
            top: 0;
            z-index: 10;
        }
        .header h1 { font-size: 1.5rem; color: #1da1f2; letter-spacing: 1px; }
        .tabs { display: flex; gap: 0.25rem; background: #1c2732; border-radius: 999px; padding: 0.25rem; }
        .tab {
            padding: 0.5rem 1.5rem; border: none; background: none; color: #71767b;
            font-weight: 600; border-radius: 999px; cursor: pointer;
        }
        .tab.active { background: #1da1f2; color: #fff; }
        .bell { position: relative; background: none; border: none; color: #e7e9ea; font-size: 1.25rem; cursor: pointer; }
        .badge {
            position: absolute; top: -6px; right: -10px; min-width: 20px; height: 20px;
            border-radius: 10px; background: #f91880; color: #fff; font-size: 0.75rem;
            font-weight: 700; display: none; align-items: center; justify-content: center;
        }
        .badge.visible { display: flex; }

        .container { padding: 1.5rem; max-width: 1600px; margin: 0 auto; }
        .grid { display: grid; gap: 1.5rem; }
        .grid-6 { grid-template-columns: repeat(6, 1fr); }
        .grid-2 { grid-template-columns: repeat(2, 1fr); }
        @media (max-width: 1200px) { .grid-6 { grid-template-columns: repeat(3, 1fr); } }
        @media (max-width: 768px) { .grid-6, .grid-2 { grid-template-columns: 1fr; } }

        .card { background: #16202a; border-radius: 12px; padding: 1.5rem; border: 1px solid #2f3336; }
        .card-title {
            font-size: 0.875rem; color: #71767b; text-transform: uppercase;
            letter-spacing: 0.5px; margin-bottom: 0.75rem;
        }
        .card-value { font-size: 1.75rem; font-weight: 700; }
        .card-subtitle { font-size: 0.875rem; color: #71767b; margin-top: 0.25rem; }
        .positive { color: #00ba7c; }
        .negative { color: #f4212e; }
        .muted { color: #71767b; }

        .chart-container { height: 300px; position: relative; }
        .table-container { overflow-x: auto; max-height: 400px; }
        table { width: 100%; border-collapse: collapse; }
        th, td { padding: 0.75rem; text-align: left; border-bottom: 1px solid #2f3336; }
        th { color: #71767b; font-weight: 500; font-size: 0.75rem; text-transform: uppercase; position: sticky; top: 0; background: #16202a; }
        td { font-size: 0.875rem; }
        .side-badge { display: inline-block; padding: 0.25rem 0.5rem; border-radius: 4px; font-size: 0.75rem; font-weight: 600; }
        .side-buy { background: rgba(0, 186, 124, 0.2); color: #00ba7c; }
        .side-sell { background: rgba(244, 33, 46, 0.2); color: #f4212e; }
        .section-title { font-size: 1.25rem; font-weight: 600; margin-bottom: 1rem; }
        .mt-1 { margin-top: 1.5rem; }
        .forecast-controls { display: flex; gap: 0.5rem; margin-bottom: 1rem; }
        .forecast-controls button, .forecast-controls select {
            background: #1c2732; color: #e7e9ea; border: 1px solid #2f3336;
            border-radius: 6px; padding: 0.4rem 0.9rem; cursor: pointer;
        }
    </style>
</head>
<body>
    <div class="header">
        <h1>STARSHOT</h1>
        <div class="tabs">
            <button class="tab active" data-model="chatgpt">CHATGPT</button>
            <button class="tab" data-model="gemini">GEMINI</button>
        </div>
        <button class="bell" id="bell" title="New completed trades">&#128276;<span class="badge" id="badge">0</span></button>
    </div>

    <div class="container">
        <div class="grid grid-6">
            <div class="card"><div class="card-title">Total Balance</div><div class="card-value" id="total-balance">N/A</div></div>
            <div class="card"><div class="card-title">P&amp;L</div><div class="card-value" id="pnl">N/A</div><div class="card-subtitle" id="percentage-profit"></div></div>
            <div class="card"><div class="card-title">Win Rate</div><div class="card-value" id="win-rate">N/A</div><div class="card-subtitle" id="win-loss"></div></div>
            <div class="card"><div class="card-title">Total Trades</div><div class="card-value" id="total-trades">N/A</div></div>
            <div class="card"><div class="card-title">Biggest Win</div><div class="card-value" id="biggest-win">N/A</div></div>
            <div class="card"><div class="card-title">Open Positions</div><div class="card-value" id="open-count">N/A</div></div>
        </div>

        <div class="grid grid-2 mt-1">
            <div class="card">
                <div class="section-title">Profit per Trade</div>
                <div class="chart-container"><canvas id="profit-chart"></canvas></div>
            </div>
            <div class="card">
                <div class="section-title">Cumulative Profit</div>
                <div class="forecast-controls">
                    <select id="forecast-duration">
                        <option value="1W">1 week</option>
                        <option value="1M" selected>1 month</option>
                        <option value="3M">3 months</option>
                        <option value="1Y">1 year</option>
                    </select>
                    <button id="forecast-button">Forecast</button>
                    <span class="muted" id="forecast-status"></span>
                </div>
                <div class="chart-container"><canvas id="cumulative-chart"></canvas></div>
            </div>
        </div>

        <div class="card mt-1">
            <div class="section-title">Open Trades</div>
            <div class="table-container"><table>
                <thead><tr><th>Asset</th><th>Type</th><th>Opened</th><th>Open Rate</th><th>Amount</th></tr></thead>
                <tbody id="open-trades"></tbody>
            </table></div>
        </div>

        <div class="card mt-1">
            <div class="section-title">Closed Trades</div>
            <div class="table-container"><table>
                <thead><tr><th>Asset</th><th>Type</th><th>Closed</th><th>Open Rate</th><th>Close Rate</th><th>Profit</th><th>Profit %</th></tr></thead>
                <tbody id="closed-trades"></tbody>
            </table></div>
        </div>
    </div>

    <script>
        const POLL_MS = 15000;
        const MODELS = ['chatgpt', 'gemini'];
        const snapshots = {};
        const errors = {};
        let activeModel = 'chatgpt';
        let pollHandle = null;
        let prediction = [];
        let profitChart = null;
        let cumulativeChart = null;

        const money = v => (v < 0 ? '-$' : '$') + Math.abs(v).toFixed(2);
        const pct = v => v.toFixed(2) + '%';
        const day = iso => iso ? new Date(iso).toLocaleString() : '-';
        const signClass = v => v > 0 ? 'positive' : (v < 0 ? 'negative' : '');
        const escapeHtml = v => String(v ?? '').replace(/[&<>"']/g, c => ({
            '&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;', "'": '&#39;',
        })[c]);
        const sideClass = v => v === 'SELL' ? 'side-sell' : 'side-buy';

        async function fetchModel(model) {
            try {
                const response = await fetch(`/api/trading-data?model=${model}`, { cache: 'no-store' });
                const body = await response.json();
                if (!response.ok) throw new Error(body.error || response.statusText);
                errors[model] = null;
                return body;
            } catch (err) {
                console.error(`Error fetching ${model} data:`, err);
                errors[model] = err.message || String(err);
                return null;
            }
        }

        async function refreshAll() {
            const results = await Promise.all(MODELS.map(fetchModel));
            MODELS.forEach((model, i) => { snapshots[model] = results[i]; });
            render();
            refreshBadge();
        }

        async function refreshBadge() {
            try {
                const body = await (await fetch('/api/notifications')).json();
                const badge = document.getElementById('badge');
                badge.textContent = body.count;
                badge.classList.toggle('visible', body.count > 0);
            } catch (err) {
                console.error('Error fetching notifications:', err);
            }
        }

        function setText(id, text, cls) {
            const el = document.getElementById(id);
            el.textContent = text;
            el.className = el.className.split(' ').filter(c => c !== 'positive' && c !== 'negative').join(' ');
            if (cls) el.classList.add(cls);
        }

        function render() {
            const data = snapshots[activeModel];
            if (!data) {
                ['total-balance', 'pnl', 'win-rate', 'total-trades', 'biggest-win', 'open-count']
                    .forEach(id => setText(id, 'N/A'));
                setText('percentage-profit', errors[activeModel] || 'No data available', errors[activeModel] ? 'negative' : null);
                setText('win-loss', '');
                document.getElementById('open-trades').innerHTML = '';
                document.getElementById('closed-trades').innerHTML = '';
                drawCharts([], []);
                return;
            }

            setText('total-balance', money(data.totalBalance));
            setText('pnl', money(data.pnl), signClass(data.pnl));
            setText('percentage-profit', pct(data.percentageProfit) + ' return');
            setText('win-rate', pct(data.winRate * 100));
            setText('win-loss', `${data.winningTrades} wins / ${data.losingTrades} losses`);
            setText('total-trades', String(data.totalTrades));
            setText('biggest-win', money(data.biggestWin), signClass(data.biggestWin));
            setText('open-count', String(data.openTrades.length));

            // Upstream strings are untrusted; escape everything interpolated into markup.
            document.getElementById('open-trades').innerHTML = data.openTrades.map(t => `
                <tr><td>${escapeHtml(t.asset)}</td>
                <td><span class="side-badge ${sideClass(t.type)}">${escapeHtml(t.type)}</span></td>
                <td>${escapeHtml(day(t.openDate))}</td><td>${escapeHtml(t.openRate)}</td><td>${escapeHtml(t.amount)}</td></tr>`).join('')
                || '<tr><td colspan="5" class="muted">No open trades</td></tr>';

            document.getElementById('closed-trades').innerHTML = data.closedTrades.map(t => `
                <tr><td>${escapeHtml(t.asset)}</td>
                <td><span class="side-badge ${sideClass(t.type)}">${escapeHtml(t.type)}</span></td>
                <td>${escapeHtml(day(t.closeDate))}</td><td>${escapeHtml(t.openRate)}</td><td>${escapeHtml(t.closeRate)}</td>
                <td class="${signClass(t.profitAbs)}">${escapeHtml(money(t.profitAbs))}</td>
                <td class="${signClass(t.profitPercentage)}">${escapeHtml(pct(t.profitPercentage))}</td></tr>`).join('')
                || '<tr><td colspan="7" class="muted">No closed trades</td></tr>';

            drawCharts(data.tradeHistoryForCharts, data.cumulativeProfitHistory);
        }

        function drawCharts(history, cumulative) {
            const profitData = {
                labels: history.map(p => p.name),
                datasets: [{
                    label: 'Profit',
                    data: history.map(p => p.profit),
                    backgroundColor: history.map(p => p.profit >= 0 ? '#00ba7c' : '#f4212e'),
                }],
            };
            const cumulativeData = {
                labels: cumulative.map(p => p.date).concat(prediction.map(p => p.date)),
                datasets: [{
                    label: 'Cumulative Profit',
                    data: cumulative.map(p => p.cumulativeProfit),
                    borderColor: '#1da1f2',
                    backgroundColor: 'rgba(29, 161, 242, 0.2)',
                    fill: true,
                    tension: 0.3,
                }, {
                    label: 'Forecast',
                    data: cumulative.map(() => null).concat(prediction.map(p => p.predictedProfit)),
                    borderColor: '#f91880',
                    borderDash: [6, 4],
                    fill: false,
                }],
            };
            const options = { responsive: true, maintainAspectRatio: false, animation: false, plugins: { legend: { display: false } } };

            if (!profitChart) {
                profitChart = new Chart(document.getElementById('profit-chart'), { type: 'bar', data: profitData, options });
                cumulativeChart = new Chart(document.getElementById('cumulative-chart'), { type: 'line', data: cumulativeData, options });
            } else {
                profitChart.data = profitData;
                cumulativeChart.data = cumulativeData;
                profitChart.update();
                cumulativeChart.update();
            }
        }

        async function forecast() {
            const data = snapshots[activeModel];
            const status = document.getElementById('forecast-status');
            if (!data) return;
            const history = data.cumulativeProfitHistory.map(p => ({ date: p.date, cumulativeProfit: p.cumulativeProfit }));
            status.textContent = 'Forecasting...';
            try {
                const response = await fetch('/api/predict-profit', {
                    method: 'POST',
                    headers: { 'Content-Type': 'application/json' },
                    body: JSON.stringify({ history, duration: document.getElementById('forecast-duration').value }),
                });
                const body = await response.json();
                if (!response.ok) throw new Error(body.error || response.statusText);
                prediction = body.prediction;
                status.textContent = prediction.length ? '' : 'Not enough history';
            } catch (err) {
                console.error('Forecast failed:', err);
                prediction = [];
                status.textContent = 'Forecast unavailable';
            }
            render();
        }

        function selectModel(model) {
            activeModel = model;
            prediction = [];
            document.getElementById('forecast-status').textContent = '';
            document.querySelectorAll('.tab').forEach(t => t.classList.toggle('active', t.dataset.model === model));
            render();
        }

        function startPolling() {
            if (pollHandle !== null) return;
            refreshAll();
            pollHandle = setInterval(refreshAll, POLL_MS);
        }

        function stopPolling() {
            if (pollHandle === null) return;
            clearInterval(pollHandle);
            pollHandle = null;
        }

        document.querySelectorAll('.tab').forEach(t => t.addEventListener('click', () => selectModel(t.dataset.model)));
        document.getElementById('forecast-button').addEventListener('click', forecast);
        document.getElementById('bell').addEventListener('click', async () => {
            await fetch('/api/notifications/clear', { method: 'POST' });
            refreshBadge();
        });

        // Swipe left/right to switch bots on touch screens.
        let touchStartX = null;
        document.addEventListener('touchstart', e => { touchStartX = e.changedTouches[0].screenX; });
        document.addEventListener('touchend', e => {
            if (touchStartX === null) return;
            const dx = e.changedTouches[0].screenX - touchStartX;
            touchStartX = null;
            if (Math.abs(dx) < 60) return;
            const next = MODELS.indexOf(activeModel) + (dx < 0 ? 1 : -1);
            if (next >= 0 && next < MODELS.length) selectModel(MODELS[next]);
        });

        document.addEventListener('visibilitychange', () => {
            if (document.hidden) stopPolling(); else startPolling();
        });

        if (!document.hidden) startPolling();
    </script>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::error::{ForecastError, UpstreamError};
    use crate::forecast::{MockLanguageModel, ProfitForecaster};
    use crate::upstream::{Endpoint, MockBotApi};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state_with(api: MockBotApi, forecaster: Option<ProfitForecaster>) -> AppState {
        AppState::new(
            Arc::new(Settings::default()),
            Arc::new(api),
            forecaster.map(Arc::new),
        )
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_unknown_model_is_bad_request() {
        let mut api = MockBotApi::new();
        api.expect_fetch_json().times(0);
        let router = build_router(state_with(api, None));

        let (status, body) = send(router.clone(), get("/api/trading-data?model=unknown")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, body) = send(router, get("/api/trading-data")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_upstream_timeout_fails_open() {
        let mut api = MockBotApi::new();
        api.expect_fetch_json()
            .returning(|_, _| Err(UpstreamError::Decode("operation timed out".to_string())));
        let router = build_router(state_with(api, None));

        let (status, body) = send(router, get("/api/trading-data?model=gemini")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["openTrades"], json!([]));
        assert_eq!(body["closedTrades"], json!([]));
        assert_eq!(body["totalTrades"], 0);
        assert_eq!(body["winRate"], 0.0);
    }

    #[tokio::test]
    async fn test_bad_upstream_shape_is_server_error() {
        let mut api = MockBotApi::new();
        api.expect_fetch_json().returning(|_, endpoint| match endpoint {
            Endpoint::Trades => Ok(json!({"trades": 42})),
            _ => Ok(json!({})),
        });
        let router = build_router(state_with(api, None));

        let (status, body) = send(router, get("/api/trading-data?model=chatgpt")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("chatgpt"));
    }

    #[tokio::test]
    async fn test_new_trades_raise_badge() {
        let mut api = MockBotApi::new();
        let mut calls = 0;
        api.expect_fetch_json().returning(move |_, endpoint| {
            if endpoint != Endpoint::Trades {
                return Ok(json!({}));
            }
            calls += 1;
            let trades: Vec<Value> = (0..calls)
                .map(|i| json!({"pair": "BTC/USDT", "close_date_ts": 1704067200000i64 + i, "profit_abs": 1}))
                .collect();
            Ok(json!({ "trades": trades }))
        });
        let router = build_router(state_with(api, None));

        send(router.clone(), get("/api/trading-data?model=chatgpt")).await;
        send(router.clone(), get("/api/trading-data?model=chatgpt")).await;
        let (_, body) = send(router.clone(), get("/api/notifications")).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["recent"][0]["model"], "chatgpt");

        let (status, _) = send(router.clone(), post_json("/api/notifications/clear", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = send(router, get("/api/notifications")).await;
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn test_predict_without_model_is_unavailable() {
        let router = build_router(state_with(MockBotApi::new(), None));
        let input = json!({"history": [], "duration": "1W"});

        let (status, body) = send(router, post_json("/api/predict-profit", input)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_predict_short_history_returns_empty() {
        let mut model = MockLanguageModel::new();
        model.expect_complete_json().times(0);
        let forecaster = ProfitForecaster::new(Arc::new(model));
        let router = build_router(state_with(MockBotApi::new(), Some(forecaster)));

        let input = json!({"history": [{"date": "2024-01-01", "cumulativeProfit": 100}], "duration": "1W"});
        let (status, body) = send(router, post_json("/api/predict-profit", input)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"prediction": []}));
    }

    #[tokio::test]
    async fn test_predict_schema_violation_is_server_error() {
        let mut model = MockLanguageModel::new();
        model
            .expect_complete_json()
            .returning(|_| Err(ForecastError::SchemaViolation("missing prediction".to_string())));
        let forecaster = ProfitForecaster::new(Arc::new(model));
        let router = build_router(state_with(MockBotApi::new(), Some(forecaster)));

        let input = json!({
            "history": [
                {"date": "2024-01-01", "cumulativeProfit": 100},
                {"date": "2024-01-08", "cumulativeProfit": 150}
            ],
            "duration": "1M"
        });
        let (status, body) = send(router, post_json("/api/predict-profit", input)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("missing prediction"));
    }

    #[tokio::test]
    async fn test_health_and_dashboard() {
        let router = build_router(state_with(MockBotApi::new(), None));
        let (status, body) = send(router.clone(), get("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let response = router.oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("/api/trading-data?model="));
        assert!(html.contains("visibilitychange"));
    }

    #[test]
    fn test_dashboard_escapes_trade_fields() {
        // Every field rendered into a table row goes through escapeHtml.
        for field in ["t.asset", "t.type", "t.openRate", "t.amount", "t.closeRate"] {
            assert!(
                DASHBOARD_HTML.contains(&format!("escapeHtml({})", field)),
                "{} is not escaped",
                field
            );
            assert!(!DASHBOARD_HTML.contains(&format!("${{{}}}", field)), "{} is interpolated raw", field);
        }
        assert!(DASHBOARD_HTML.contains("'<': '&lt;'"));
    }

    #[test]
    fn test_dashboard_shows_fetch_errors() {
        assert!(DASHBOARD_HTML.contains("errors[model] = err.message"));
        assert!(DASHBOARD_HTML.contains("setText('percentage-profit', errors[activeModel]"));
    }
}
