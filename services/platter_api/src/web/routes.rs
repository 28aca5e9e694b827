// services/platter_api/src/web/routes.rs

use crate::web::handlers::{admin_handlers, auth_handlers, order_handlers, payment_handlers};
use actix_web::web;

async fn health_check_handler() -> actix_web::HttpResponse {
  actix_web::HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api/v1")
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/auth")
          .route("/signup", web::post().to(auth_handlers::signup_handler))
          .route("/signin", web::post().to(auth_handlers::signin_handler)),
      )
      .service(
        web::scope("/payments")
          .route("/checkout", web::post().to(payment_handlers::checkout_handler))
          .route("/verify", web::post().to(payment_handlers::verify_payment_handler))
          // Raw body: the signature covers the exact bytes.
          .route("/webhook", web::post().to(payment_handlers::payment_webhook_handler)),
      )
      .service(
        web::scope("/orders")
          .route("/cod", web::post().to(order_handlers::place_cod_order_handler))
          .route("/mine", web::get().to(order_handlers::my_orders_handler))
          .route("/{order_id}", web::get().to(order_handlers::get_order_handler))
          .route("/{order_id}/events", web::get().to(order_handlers::order_events_handler))
          .route("/{order_id}/status", web::patch().to(order_handlers::update_order_status_handler)),
      )
      .service(
        web::scope("/admin")
          .route("/orders", web::get().to(admin_handlers::all_orders_handler))
          .route("/orders/{order_id}/assign", web::put().to(admin_handlers::assign_agent_handler))
          .route("/events", web::get().to(admin_handlers::admin_events_handler)),
      )
      .service(web::scope("/delivery").route("/orders", web::get().to(order_handlers::delivery_orders_handler))),
  );
}
