use std::net::SocketAddr;
use warp::Filter;

use super::health::HealthChecker;

/// `GET /health` returning the latest [`super::CycleStatus`] as JSON.
pub fn health_route(
    health_checker: HealthChecker,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::any().map(move || health_checker.clone()))
        .and_then(|checker: HealthChecker| async move {
            let status = checker.get_status().await;
            Ok::<_, warp::Rejection>(warp::reply::json(&*status))
        })
}

pub async fn start_health_server(health_checker: HealthChecker, port: u16) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("✅ Health endpoint listening on {}", addr);
    warp::serve(health_route(health_checker)).run(addr).await;
}
