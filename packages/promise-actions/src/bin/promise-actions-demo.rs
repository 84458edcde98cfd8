//! Walks one promise action through a store: dispatch, saga, resolve.
//!
//! ```text
//! DEMO_RESOLVE_VALUE=7 RUST_LOG=debug cargo run --bin promise-actions-demo
//! ```

use std::env;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use promise_actions::{
    implement_promise_action, Action, ActionSuite, LoggingMiddleware, PromiseMiddleware, SagaConfig,
    SagaMiddleware, Stage, Store,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CONTROL: &str = "demo/CONTROL";

/// Demo configuration
#[derive(Debug, Clone)]
struct DemoConfig {
    resolve_value: i64,
}

impl DemoConfig {
    fn from_env() -> Result<Self> {
        let _ = dotenv();

        Ok(Self {
            resolve_value: env::var("DEMO_RESOLVE_VALUE")
                .unwrap_or_else(|_| "42".to_string())
                .parse()
                .context("DEMO_RESOLVE_VALUE must be a valid integer")?,
        })
    }
}

#[derive(Debug, Default, Clone, Serialize)]
struct DemoState {
    trigger: Option<Value>,
    resolved: Option<Value>,
    rejected: Option<String>,
    seen: Vec<String>,
}

fn reducer(suite: ActionSuite) -> impl Fn(&mut DemoState, &Action) + Send + Sync + 'static {
    move |state, action| {
        state.seen.push(action.action_type.clone());
        match suite.stage_of(action) {
            Some(Stage::Trigger) => state.trigger = action.payload.as_value().cloned(),
            Some(Stage::Resolved) => state.resolved = action.payload.as_value().cloned(),
            Some(Stage::Rejected) => state.rejected = action.payload.as_error().map(|e| e.to_string()),
            None => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,promise_actions=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = DemoConfig::from_env().context("Failed to load demo configuration")?;
    let saga_config = SagaConfig::from_env().context("Failed to load saga configuration")?;
    tracing::info!(?config, ?saga_config, "Configuration loaded");

    let act = ActionSuite::new("ACT");
    let sagas = SagaMiddleware::with_config(saga_config);
    let store = Store::builder(DemoState::default(), reducer(act.clone()))
        .with_middleware(LoggingMiddleware::new())
        .with_middleware(PromiseMiddleware)
        .with_middleware(sagas.clone())
        .build();

    // The saga resolves the trigger with whatever value the control event carries.
    let saga = sagas.run(&store, {
        let act = act.clone();
        move |mut ctx| async move {
            let trigger = ctx.take(&act).await?;
            let control = ctx.take(CONTROL).await?;

            implement_promise_action(&trigger, || async move {
                control
                    .payload
                    .as_value()
                    .and_then(|v| v.get("resolveValue"))
                    .cloned()
                    .context("control event carries no resolveValue")
            })
            .await?;
            anyhow::Ok(())
        }
    });

    let deferred = store
        .dispatch(act.create(json!({ "x": 1 })))
        .into_deferred()
        .context("trigger action was not deferred; is PromiseMiddleware installed?")?;

    store.dispatch(Action::new(CONTROL, json!({ "resolveValue": config.resolve_value })));

    match deferred.await {
        Ok(value) => tracing::info!(%value, "promise action resolved"),
        Err(e) => tracing::warn!(error = %e, "promise action rejected"),
    }
    saga.await??;

    println!("{}", serde_json::to_string_pretty(&store.state())?);

    Ok(())
}
