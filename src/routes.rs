use std::collections::HashMap;

use actix_web::{
    get, post,
    web::{self, Data},
    HttpResponse, Responder,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tera::Context;

use crate::{
    errors::{AppError, LedgerError},
    ledger::LedgerSnapshot,
    structs::DailyCollection,
    utils::parse_u32,
    AppState, TEMPLATES,
};

const PERCENT_PREFIX: &str = "percent_";
const COLLECTION_WINDOW_DAYS: u32 = 30;

#[derive(Serialize)]
struct SnapshotResponse<'a> {
    #[serde(flatten)]
    snapshot: LedgerSnapshot<'a>,
    daily_collections: Vec<DailyCollection>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(index_handler)
        .service(snapshot_handler)
        .service(add_user_handler)
        .service(add_deal_handler)
        .service(assign_syndication_handler)
        .service(update_payment_handler)
        .service(modify_payment_handler);
}

/// Schedules are anchored to the server's local calendar day.
fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn redirect_home() -> HttpResponse {
    HttpResponse::SeeOther()
        .append_header(("Location", "/"))
        .finish()
}

/// Turns the 1-based day shown on the dashboard into a schedule index.
fn day_index(raw: &str) -> Result<usize, LedgerError> {
    let day = parse_u32("day", raw)?;
    day.checked_sub(1)
        .map(|d| d as usize)
        .ok_or_else(|| LedgerError::invalid("day", "days are numbered from 1"))
}

#[get("/")]
pub async fn index_handler(state: Data<AppState>) -> Result<impl Responder, AppError> {
    let ledger = state.ledger.read().await;
    let snapshot = ledger.snapshot();

    let mut context = Context::new();
    context.insert("title", "MCA Tracker");
    context.insert("version", env!("CARGO_PKG_VERSION"));
    context.insert("today", &today());
    context.insert("users", &snapshot.users);
    context.insert("deals", &snapshot.deals);
    context.insert("payments", &snapshot.payments);
    context.insert("syndications", &snapshot.syndications);
    context.insert("summaries", &snapshot.summaries);
    context.insert("metrics", &snapshot.metrics);
    context.insert("distribution", &snapshot.distribution);
    context.insert(
        "daily_collections",
        &ledger.daily_collections(today(), COLLECTION_WINDOW_DAYS),
    );

    let rendered = TEMPLATES.render("dashboard.html", &context).map_err(|e| {
        log::error!("Failed to render template: {}", e);
        AppError::TemplateError(e)
    })?;

    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(rendered))
}

#[get("/api/snapshot")]
pub async fn snapshot_handler(state: Data<AppState>) -> Result<impl Responder, AppError> {
    let ledger = state.ledger.read().await;
    let body = serde_json::to_string(&SnapshotResponse {
        snapshot: ledger.snapshot(),
        daily_collections: ledger.daily_collections(today(), COLLECTION_WINDOW_DAYS),
    })?;
    Ok(HttpResponse::Ok()
        .content_type("application/json")
        .body(body))
}

#[derive(Deserialize)]
pub struct AddUserForm {
    #[serde(default)]
    username: String,
}

#[post("/add_user")]
pub async fn add_user_handler(
    web::Form(form): web::Form<AddUserForm>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    state.ledger.write().await.add_user(&form.username);
    Ok(redirect_home())
}

#[derive(Deserialize)]
pub struct AddDealForm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    size: String,
    #[serde(default)]
    rate: String,
    #[serde(default)]
    term: String,
}

#[post("/add_deal")]
pub async fn add_deal_handler(
    web::Form(form): web::Form<AddDealForm>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let mut ledger = state.ledger.write().await;
    ledger
        .add_deal(&form.name, &form.size, &form.rate, &form.term, today())
        .map_err(|e| {
            log::warn!("Rejected deal {:?}: {}", form.name, e);
            AppError::from(e)
        })?;
    Ok(redirect_home())
}

/// Takes `deal_id` plus one optional `percent_<username>` field per user.
#[post("/assign_syndication")]
pub async fn assign_syndication_handler(
    web::Form(form): web::Form<HashMap<String, String>>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let deal_id = form
        .get("deal_id")
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| LedgerError::invalid("deal_id", "a deal must be selected"))?;

    let percent_by_user: HashMap<String, String> = form
        .iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(PERCENT_PREFIX)
                .map(|user| (user.to_owned(), value.clone()))
        })
        .collect();

    let mut ledger = state.ledger.write().await;
    ledger
        .assign_syndication(deal_id, &percent_by_user)
        .map_err(|e| {
            log::warn!("Rejected syndication for {:?}: {}", deal_id, e);
            AppError::from(e)
        })?;
    Ok(redirect_home())
}

#[derive(Deserialize)]
pub struct UpdatePaymentForm {
    deal_id: String,
    day: String,
    #[serde(default)]
    status: String,
}

#[post("/update_payment")]
pub async fn update_payment_handler(
    web::Form(form): web::Form<UpdatePaymentForm>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let index = day_index(&form.day)?;
    state
        .ledger
        .write()
        .await
        .update_payment_status(form.deal_id.trim(), index, &form.status)?;
    Ok(redirect_home())
}

#[derive(Deserialize)]
pub struct ModifyPaymentForm {
    deal_id: String,
    day: String,
    amount: String,
    #[serde(default)]
    note: String,
}

#[post("/modify_payment")]
pub async fn modify_payment_handler(
    web::Form(form): web::Form<ModifyPaymentForm>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let index = day_index(&form.day)?;
    state.ledger.write().await.modify_payment(
        form.deal_id.trim(),
        index,
        &form.amount,
        &form.note,
    )?;
    Ok(redirect_home())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Ledger;
    use actix_web::{body::to_bytes, http::StatusCode, test, App};
    use pretty_assertions::assert_eq;
    use tokio::sync::RwLock;

    fn demo_state() -> Data<AppState> {
        Data::new(AppState {
            ledger: RwLock::new(Ledger::with_demo_data(today()).unwrap()),
        })
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(App::new().app_data($state.clone()).configure(configure)).await
        };
    }

    #[actix_web::test]
    async fn dashboard_renders_demo_book() {
        let state = demo_state();
        let app = app!(state);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body()).await.unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("Green Cafe"));
        assert!(html.contains("TechNova Labs"));
        assert!(html.contains("jacobo"));
        assert!(html.contains("1490.00"));
        assert!(html.contains("Deal Distribution"));
        assert!(html.contains("55.56%"));
        assert!(html.contains("Daily Collections"));
    }

    #[actix_web::test]
    async fn add_user_redirects_and_normalizes() {
        let state = demo_state();
        let app = app!(state);

        for name in ["  Maria ", "MARIA", ""] {
            let req = test::TestRequest::post()
                .uri("/add_user")
                .set_form([("username", name)])
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::SEE_OTHER);
            assert_eq!(resp.headers().get("Location").unwrap(), "/");
        }

        let ledger = state.ledger.read().await;
        assert_eq!(ledger.users().len(), 7);
        assert_eq!(ledger.users().last().map(String::as_str), Some("maria"));
    }

    #[actix_web::test]
    async fn add_deal_builds_schedule_from_today() {
        let state = demo_state();
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/add_deal")
            .set_form([("name", "Corner Deli"), ("size", "20000"), ("rate", "1.4"), ("term", "40")])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);

        let ledger = state.ledger.read().await;
        let deal = ledger.deal("D104").unwrap();
        assert_eq!(deal.name, "Corner Deli");
        let schedule = ledger.payments("D104").unwrap();
        assert_eq!(schedule.len(), 40);
        assert_eq!(schedule[0].amount.to_string(), "700.00");
    }

    #[actix_web::test]
    async fn malformed_deal_is_a_bad_request() {
        let state = demo_state();
        let app = app!(state);

        for (size, term) in [("ten grand", "30"), ("10000", "0"), ("10000", "4294967295")] {
            let req = test::TestRequest::post()
                .uri("/add_deal")
                .set_form([("name", "Oops"), ("size", size), ("rate", "1.4"), ("term", term)])
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        }
        assert_eq!(state.ledger.read().await.deals().len(), 3);
    }

    #[actix_web::test]
    async fn assign_syndication_replaces_shares() {
        let state = demo_state();
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/assign_syndication")
            .set_form([
                ("deal_id", "D101"),
                ("percent_albert", "40"),
                ("percent_jacobo", ""),
                ("percent_matty", "0"),
            ])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);

        let ledger = state.ledger.read().await;
        let shares = ledger.syndication("D101").unwrap();
        assert_eq!(shares.len(), 1);
        assert_eq!(shares.get("albert"), Some(&40));
    }

    #[actix_web::test]
    async fn assign_syndication_to_unknown_deal_is_not_found() {
        let state = demo_state();
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/assign_syndication")
            .set_form([("deal_id", "D999"), ("percent_albert", "100")])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::post()
            .uri("/assign_syndication")
            .set_form([("percent_albert", "100")])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn payment_updates_show_in_snapshot() {
        let state = demo_state();
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/update_payment")
            .set_form([("deal_id", "D101"), ("day", "1"), ("status", "paid")])
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::SEE_OTHER);

        let req = test::TestRequest::post()
            .uri("/modify_payment")
            .set_form([("deal_id", "D101"), ("day", "2"), ("amount", "745"), ("note", "half day")])
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::SEE_OTHER);

        let req = test::TestRequest::post()
            .uri("/update_payment")
            .set_form([("deal_id", "D101"), ("day", "0"), ("status", "paid")])
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/api/snapshot").to_request();
        let snapshot: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(snapshot["metrics"]["total_collected"], "1490.00");
        let day_two = &snapshot["payments"]["D101"][1];
        assert_eq!(day_two["amount"], "745.00");
        assert_eq!(day_two["original_amount"], "1490.00");
        assert_eq!(day_two["status"], "modified");
        assert_eq!(day_two["note"], "half day");

        let series = snapshot["daily_collections"].as_array().unwrap();
        assert_eq!(series.len(), 30);
        assert_eq!(series[29]["date"], today().to_string());
        assert_eq!(series[29]["collected"], "1490.00");
        assert_eq!(snapshot["distribution"][2]["percent"], "55.56");
    }
}
