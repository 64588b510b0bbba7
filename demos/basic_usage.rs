//! Basic usage example of cache-gate.

use cache_gate::{
    backend::InMemoryBackend, config::SessionConfig, error::Result, CacheCandidate, SessionBuilder,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Example record: Employment, scoped under a loan application.
#[derive(Clone, Serialize, Deserialize, Debug)]
struct Employment {
    id: String,
    employer_name: String,
    salary: f64,
}

impl CacheCandidate for Employment {
    fn cache_key(&self, loanapp_id: &str, _parent2: &str) -> String {
        format!("EMPLOYMENT:{}:{}", loanapp_id, self.id)
    }

    fn master_key() -> &'static str {
        "EMPLOYMENT:"
    }

    fn default_expiration() -> Option<Duration> {
        Some(Duration::from_secs(10 * 60))
    }
}

/// A type nobody registered.
#[derive(Clone, Serialize, Deserialize, Debug)]
struct AuditTrail {
    entries: Vec<String>,
}

impl CacheCandidate for AuditTrail {
    fn cache_key(&self, loanapp_id: &str, _parent2: &str) -> String {
        format!("AUDIT:{}", loanapp_id)
    }

    fn master_key() -> &'static str {
        "AUDIT:"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .init();

    let session = SessionBuilder::new(InMemoryBackend::new())
        .config(SessionConfig {
            key_prefix: "demo:".to_string(),
            debug_logging: true,
            ..Default::default()
        })
        .candidate::<Employment>("employment per loan application")
        .build()
        .await?;

    println!("Registered candidates: {:?}", session.list_candidates());

    let employment = Employment {
        id: "emp_001".to_string(),
        employer_name: "Acme Corp".to_string(),
        salary: 75000.0,
    };

    println!("\n=== Typed write and read ===");
    session.set(&employment, "loan_123", "").await?;
    let cached: Employment = session.get_scan("loan_123", "", &employment).await?;
    println!("  Cached: {:?}", cached);

    println!("\n=== Slice write and read ===");
    let history = vec![employment.clone(), employment.clone()];
    session
        .set_slice(Some(history.as_slice()), "loan_123:history", "", &employment)
        .await?;
    let loaded = session
        .get_slice("loan_123:history", "", &employment)
        .await?;
    println!("  Loaded {} entries", loaded.len());

    println!("\n=== Registration gate ===");
    let audit = AuditTrail {
        entries: vec!["created".to_string()],
    };
    match session.set(&audit, "loan_123", "").await {
        Ok(()) => println!("  Unexpectedly cached"),
        Err(e) => println!("  Refused: {}", e),
    }

    println!("\n=== Counters ===");
    session
        .counter_set(0, "page_views", Duration::from_secs(60))
        .await?;
    session.incr_by("page_views", 5).await?;
    println!("  page_views = {}", session.counter_get("page_views").await?);

    println!("\n=== Enumeration and cleanup ===");
    println!("  Keys: {:?}", session.get_keys("*").await?);
    println!("  Removed: {}", session.del_by_pattern("*").await?);

    Ok(())
}
