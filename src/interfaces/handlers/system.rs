use actix_web::{get, web, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use humantime::format_duration;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::{sync::RwLock, time::Duration};
use sysinfo::System;

use crate::{
    constants::{HEALTH_CACHE_SECONDS, START_TIME},
    repositories::project::ProjectRepository,
    AppState,
};

#[derive(Serialize, Clone)]
struct HostInfo {
    os: String,
    kernel: String,
    hostname: String,
    cpu_count: usize,
    memory_total: String,
    process_memory: String,
}

#[derive(Serialize, Clone)]
struct StoreHealth {
    reachable: bool,
    projects: Option<usize>,
}

#[derive(Serialize, Clone)]
struct HealthReport {
    status: &'static str,
    version: &'static str,
    uptime: String,
    started_at: String,
    checked_at: String,
    record_store: StoreHealth,
    host: HostInfo,
}

struct CachedReport {
    taken_at: DateTime<Utc>,
    report: HealthReport,
}

static HEALTH_CACHE: Lazy<RwLock<Option<CachedReport>>> = Lazy::new(|| RwLock::new(None));

fn host_info() -> HostInfo {
    let mut sys = System::new_all();
    sys.refresh_all();

    let process_memory = sysinfo::get_current_pid()
        .ok()
        .and_then(|pid| sys.process(pid))
        .map_or_else(
            || "Unknown".to_string(),
            |p| format!("{:.2} MB", p.memory() as f64 / 1024.0 / 1024.0),
        );

    HostInfo {
        os: System::name().unwrap_or_else(|| "Unknown".to_string()),
        kernel: System::kernel_version().unwrap_or_else(|| "Unknown".to_string()),
        hostname: System::host_name().unwrap_or_else(|| "Unknown".to_string()),
        cpu_count: sys.cpus().len(),
        memory_total: format!("{:.2} GB", sys.total_memory() as f64 / 1024.0 / 1024.0 / 1024.0),
        process_memory,
    }
}

async fn store_health(repo: &impl ProjectRepository) -> StoreHealth {
    if let Err(e) = repo.check_connection().await {
        tracing::warn!("Record store health check failed: {}", e);
        return StoreHealth { reachable: false, projects: None };
    }

    let projects = match repo.list_projects().await {
        Ok(records) => Some(records.len()),
        Err(e) => {
            tracing::warn!("Could not count projects: {}", e);
            None
        }
    };
    StoreHealth { reachable: true, projects }
}

async fn build_report(state: &AppState, now: DateTime<Utc>) -> HealthReport {
    let uptime = now.signed_duration_since(*START_TIME).num_seconds().max(0) as u64;
    let record_store = store_health(&state.project_handler.project_repo).await;

    HealthReport {
        status: if record_store.reachable { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        uptime: format_duration(Duration::from_secs(uptime)).to_string(),
        started_at: START_TIME.to_rfc3339(),
        checked_at: now.to_rfc3339(),
        record_store,
        host: host_info(),
    }
}

fn cached_report(now: DateTime<Utc>) -> Option<HealthReport> {
    let guard = HEALTH_CACHE
        .read()
        .map_err(|e| tracing::warn!("Health cache lock poisoned: {}", e))
        .ok()?;
    guard
        .as_ref()
        .filter(|cached| (now - cached.taken_at).num_seconds() < HEALTH_CACHE_SECONDS)
        .map(|cached| cached.report.clone())
}

/// Service health. A report is reused for `HEALTH_CACHE_SECONDS`.
#[get("/health")]
pub async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let now = Utc::now();
    if let Some(report) = cached_report(now) {
        return HttpResponse::Ok().json(report);
    }

    let report = build_report(&state, now).await;
    if let Ok(mut cache) = HEALTH_CACHE.write() {
        *cache = Some(CachedReport { taken_at: now, report: report.clone() });
    }
    HttpResponse::Ok().json(report)
}
