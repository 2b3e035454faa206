//! Scripted page scenarios for the `sb simulate` command

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use super::fixture::Fixture;
use super::loader::ScriptedLoader;
use super::runtime::ScriptedRuntime;
use super::search::ScriptedSearch;
use crate::config::Config;
use crate::domain::{IdentityPayload, Route};
use crate::page::{Frame, PageSession, SessionStats};
use crate::signal::{SignalOrigin, create_signal_bus};
use crate::widget::GlobalScope;

/// A signal the runtime dispatches at a fixed offset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedSignal {
    #[serde(rename = "at-ms")]
    pub at_ms: u64,
    pub name: String,
    #[serde(default)]
    pub detail: Value,
}

/// A search box event at a fixed offset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedInput {
    #[serde(rename = "at-ms")]
    pub at_ms: u64,
    pub term: String,
    #[serde(rename = "latency-ms", default)]
    pub latency_ms: u64,
    /// Focus event instead of an input change
    #[serde(default)]
    pub focus: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub name: String,
    pub route: String,
    pub fixture: Fixture,

    /// When the runtime attaches to the page; never when absent
    #[serde(rename = "runtime-appears-ms")]
    pub runtime_appears_ms: Option<u64>,

    /// Products the runtime itself classifies as gifts
    #[serde(rename = "runtime-gift-ids")]
    pub runtime_gift_ids: Vec<String>,

    #[serde(rename = "loader-latency-ms")]
    pub loader_latency_ms: u64,

    /// Token the loader serves from the first revalidation on
    #[serde(rename = "token-after-revalidation")]
    pub token_after_revalidation: Option<String>,

    pub signals: Vec<ScriptedSignal>,
    pub searches: Vec<ScriptedInput>,

    #[serde(rename = "duration-ms")]
    pub duration_ms: u64,

    /// How often the page is sampled for new frames
    #[serde(rename = "tick-ms")]
    pub tick_ms: u64,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::demo()
    }
}

impl Scenario {
    /// Signed-in visitor, slow cart, runtime attaching late, one gifts update
    /// and two overlapping searches
    pub fn demo() -> Self {
        Self {
            name: "demo".to_string(),
            route: "/".to_string(),
            fixture: Fixture {
                customer_token: Some("tok123".to_string()),
                cart_latency_ms: 300,
                footer_latency_ms: 150,
                products_latency_ms: 600,
                ..Fixture::demo()
            },
            runtime_appears_ms: Some(800),
            runtime_gift_ids: vec![],
            loader_latency_ms: 200,
            token_after_revalidation: None,
            signals: vec![ScriptedSignal {
                at_ms: 2000,
                name: "fg-gifts:updated".to_string(),
                detail: Value::Null,
            }],
            searches: vec![
                ScriptedInput {
                    at_ms: 400,
                    term: "snow".to_string(),
                    latency_ms: 400,
                    focus: false,
                },
                ScriptedInput {
                    at_ms: 500,
                    term: "snowboard".to_string(),
                    latency_ms: 100,
                    focus: false,
                },
            ],
            duration_ms: 3000,
            tick_ms: 50,
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .context(format!("Failed to read scenario {}", path.as_ref().display()))?;
        let scenario: Self = serde_yaml::from_str(&content).context("Failed to parse scenario")?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_ms == 0 {
            return Err(eyre!("tick-ms must be at least 1"));
        }
        if self.signals.iter().any(|s| s.name.is_empty()) {
            return Err(eyre!("scripted signals need a name"));
        }
        Ok(())
    }
}

/// What a scenario run observed
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub frames: usize,
    pub stats: SessionStats,
    #[serde(rename = "identity-pushes")]
    pub identity_pushes: Vec<IdentityPayload>,
    #[serde(rename = "customize-calls")]
    pub customize_calls: usize,
    #[serde(rename = "bundle-inits")]
    pub bundle_inits: Vec<String>,
    #[serde(rename = "final-frame")]
    pub final_frame: Frame,
}

/// Run `scenario` against scripted collaborators
///
/// `on_frame` sees every frame that differs from the one before it, with its
/// offset from session start in milliseconds.
pub async fn run(scenario: &Scenario, config: &Config, mut on_frame: impl FnMut(u64, &Frame)) -> Result<ScenarioReport> {
    info!(name = %scenario.name, route = %scenario.route, "Running scenario");
    scenario.validate()?;

    let bus = create_signal_bus(&config.signals);
    let scope = GlobalScope::new();
    let runtime = Arc::new(
        ScriptedRuntime::new()
            .with_gift_ids(scenario.runtime_gift_ids.clone())
            .with_bus(&bus),
    );
    let loader = Arc::new(
        ScriptedLoader::new(scenario.fixture.clone())
            .with_default_latency(Duration::from_millis(scenario.loader_latency_ms)),
    );
    let backend = Arc::new(ScriptedSearch::with_catalog(scenario.fixture.products.clone()));

    let start = Instant::now();
    let mut tasks: Vec<JoinHandle<()>> = vec![runtime.listen(&bus)];
    let mut session = PageSession::start(
        loader.clone(),
        Route::parse(&scenario.route),
        scope.clone(),
        bus.clone(),
        config,
    )
    .await?;
    let search = session.attach_search(backend.clone());

    if let Some(token) = &scenario.token_after_revalidation {
        let token = token.clone();
        loader.update_fixture(move |f| f.customer_token = Some(token));
    }

    if let Some(at_ms) = scenario.runtime_appears_ms {
        let scope = scope.clone();
        let runtime = runtime.clone();
        tasks.push(tokio::spawn(async move {
            tokio::time::sleep_until(start + Duration::from_millis(at_ms)).await;
            scope.install(runtime);
        }));
    }

    for scripted in scenario.signals.clone() {
        let bus = bus.clone();
        tasks.push(tokio::spawn(async move {
            tokio::time::sleep_until(start + Duration::from_millis(scripted.at_ms)).await;
            if let Err(e) = bus.dispatch_named(SignalOrigin::Widget, &scripted.name, scripted.detail) {
                warn!(name = %scripted.name, error = %e, "Scripted signal rejected");
            }
        }));
    }

    for input in scenario.searches.clone() {
        backend.set_latency(input.term.trim(), Duration::from_millis(input.latency_ms));
        let search = search.clone();
        tasks.push(tokio::spawn(async move {
            tokio::time::sleep_until(start + Duration::from_millis(input.at_ms)).await;
            if input.focus {
                search.on_focus(&input.term);
            } else {
                search.on_input(&input.term);
            }
        }));
    }

    let deadline = start + Duration::from_millis(scenario.duration_ms);
    let tick = Duration::from_millis(scenario.tick_ms);
    let mut last: Option<Frame> = None;
    let mut frames = 0;
    loop {
        let frame = session.render().context("Page render failed")?;
        if last.as_ref() != Some(&frame) {
            on_frame(start.elapsed().as_millis() as u64, &frame);
            frames += 1;
            last = Some(frame);
        }
        if Instant::now() >= deadline {
            break;
        }
        tokio::time::sleep(tick).await;
    }

    let report = ScenarioReport {
        name: scenario.name.clone(),
        frames,
        stats: session.stats(),
        identity_pushes: runtime.identity_pushes(),
        customize_calls: runtime.customize_calls().len(),
        bundle_inits: runtime.bundle_inits(),
        final_frame: last.unwrap_or_default(),
    };

    for task in tasks {
        task.abort();
    }
    session.teardown().await;
    info!(frames, "Scenario finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_demo_scenario() {
        let mut offsets = Vec::new();
        let report = run(&Scenario::demo(), &Config::default(), |at, _| offsets.push(at))
            .await
            .unwrap();

        assert!(report.frames >= 3);
        assert_eq!(offsets.len(), report.frames);
        assert_eq!(
            report.identity_pushes,
            vec![IdentityPayload {
                customer: Some("tok123".to_string())
            }]
        );
        assert_eq!(report.stats.revalidation.revalidations_requested, 1);
        assert_eq!(report.final_frame.open_overlay(), Some("cart-aside"));
        assert!(report.final_frame.aside("search-aside").unwrap().body.starts_with("\"snowboard\""));
    }

    #[tokio::test(start_paused = true)]
    async fn test_runtime_never_appears() {
        let scenario = Scenario {
            runtime_appears_ms: None,
            signals: vec![],
            searches: vec![],
            duration_ms: 20_000,
            tick_ms: 500,
            ..Scenario::demo()
        };
        let report = run(&scenario, &Config::default(), |_, _| {}).await.unwrap();

        assert_eq!(report.stats.bridge.phase, Some(crate::widget::BridgePhase::Unavailable));
        assert!(report.identity_pushes.is_empty());
        assert_eq!(report.customize_calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bundle_scenario() {
        let scenario = Scenario {
            route: "/bundle-page/offer-9".to_string(),
            runtime_appears_ms: Some(0),
            signals: vec![],
            searches: vec![],
            duration_ms: 500,
            ..Scenario::demo()
        };
        let report = run(&scenario, &Config::default(), |_, _| {}).await.unwrap();
        assert_eq!(report.bundle_inits, vec!["offer-9".to_string()]);
    }

    #[test]
    fn test_parse_minimal_yaml() {
        let yaml = r#"
name: quick
route: /bundle-page/7
runtime-appears-ms: 100
signals:
  - at-ms: 50
    name: fg-gifts:updated
searches:
  - at-ms: 10
    term: wax
    focus: true
"#;
        let scenario: Scenario = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(scenario.name, "quick");
        assert_eq!(scenario.signals[0].detail, Value::Null);
        assert!(scenario.searches[0].focus);
        assert_eq!(scenario.tick_ms, 50);
        assert!(scenario.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_tick() {
        let scenario = Scenario {
            tick_ms: 0,
            ..Scenario::demo()
        };
        assert!(scenario.validate().is_err());
    }
}
