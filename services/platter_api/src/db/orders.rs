// services/platter_api/src/db/orders.rs

use crate::errors::{AppError, Result};
use crate::models::order::UnknownVariant;
use crate::models::{
  CustomerContact, GatewayRefs, Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, RefundRecord, RefundStatus,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Change applied to an order under the store's row lock. Returning `Err`
/// aborts the update and leaves the row untouched.
pub type OrderMutation = Box<dyn FnOnce(&mut Order) -> Result<()> + Send>;

#[async_trait]
pub trait OrderRepository: Send + Sync {
  /// Fails with `Conflict` when the id or the gateway payment id is taken.
  async fn insert(&self, order: Order) -> Result<Order>;
  async fn find(&self, id: Uuid) -> Result<Option<Order>>;
  async fn find_by_refund_id(&self, refund_id: &str) -> Result<Option<Order>>;
  async fn find_by_gateway_payment_id(&self, payment_id: &str) -> Result<Option<Order>>;
  async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>>;
  async fn list_for_agent(&self, agent_id: Uuid) -> Result<Vec<Order>>;
  async fn list_all(&self) -> Result<Vec<Order>>;
  /// Atomically applies `mutation` to the current row and bumps `updated_at`.
  async fn update(&self, id: Uuid, mutation: OrderMutation) -> Result<Order>;
}

fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
  orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
  orders
}

#[derive(Default)]
pub struct InMemoryOrderRepository {
  orders: RwLock<HashMap<Uuid, Order>>,
}

impl InMemoryOrderRepository {
  pub fn new() -> Self {
    Self::default()
  }

  fn select(&self, predicate: impl Fn(&Order) -> bool) -> Vec<Order> {
    newest_first(self.orders.read().values().filter(|o| predicate(o)).cloned().collect())
  }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
  async fn insert(&self, order: Order) -> Result<Order> {
    let mut orders = self.orders.write();
    if orders.contains_key(&order.id) {
      return Err(AppError::Conflict(format!("Order {} already exists", order.id)));
    }
    if let Some(payment_id) = order.gateway.payment_id.as_deref() {
      if orders.values().any(|o| o.gateway.payment_id.as_deref() == Some(payment_id)) {
        return Err(AppError::Conflict("An order already exists for this payment".to_string()));
      }
    }
    orders.insert(order.id, order.clone());
    Ok(order)
  }

  async fn find(&self, id: Uuid) -> Result<Option<Order>> {
    Ok(self.orders.read().get(&id).cloned())
  }

  async fn find_by_refund_id(&self, refund_id: &str) -> Result<Option<Order>> {
    Ok(
      self
        .orders
        .read()
        .values()
        .find(|o| o.refund.refund_id.as_deref() == Some(refund_id))
        .cloned(),
    )
  }

  async fn find_by_gateway_payment_id(&self, payment_id: &str) -> Result<Option<Order>> {
    Ok(
      self
        .orders
        .read()
        .values()
        .find(|o| o.gateway.payment_id.as_deref() == Some(payment_id))
        .cloned(),
    )
  }

  async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
    Ok(self.select(|o| o.user_id == user_id))
  }

  async fn list_for_agent(&self, agent_id: Uuid) -> Result<Vec<Order>> {
    Ok(self.select(|o| o.delivery_agent_id == Some(agent_id)))
  }

  async fn list_all(&self) -> Result<Vec<Order>> {
    Ok(self.select(|_| true))
  }

  async fn update(&self, id: Uuid, mutation: OrderMutation) -> Result<Order> {
    let mut orders = self.orders.write();
    let current = orders
      .get_mut(&id)
      .ok_or_else(|| AppError::NotFound(format!("Order {} not found", id)))?;
    let mut draft = current.clone();
    mutation(&mut draft)?;
    draft.updated_at = Utc::now();
    *current = draft.clone();
    Ok(draft)
  }
}

// --- Postgres ---

#[derive(Debug, FromRow)]
struct OrderRow {
  id: Uuid,
  user_id: Uuid,
  items: Json<Vec<OrderItem>>,
  total_amount: Decimal,
  payment_method: String,
  payment_status: String,
  status: String,
  delivery_address: String,
  customer: Json<CustomerContact>,
  delivery_agent_id: Option<Uuid>,
  gateway_order_id: Option<String>,
  gateway_payment_id: Option<String>,
  gateway_signature: Option<String>,
  delivery_otp: Option<String>,
  delivery_otp_verified: bool,
  refund_status: String,
  refund_id: Option<String>,
  refund_amount: Option<Decimal>,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
  type Error = AppError;

  fn try_from(row: OrderRow) -> Result<Self> {
    let id = row.id;
    let corrupt = |e: UnknownVariant| AppError::Store(format!("order {}: {}", id, e));
    Ok(Order {
      id: row.id,
      user_id: row.user_id,
      items: row.items.0,
      total_amount: row.total_amount,
      payment_method: row.payment_method.parse::<PaymentMethod>().map_err(corrupt)?,
      payment_status: row.payment_status.parse::<PaymentStatus>().map_err(corrupt)?,
      status: row.status.parse::<OrderStatus>().map_err(corrupt)?,
      delivery_address: row.delivery_address,
      customer: row.customer.0,
      delivery_agent_id: row.delivery_agent_id,
      gateway: GatewayRefs {
        order_id: row.gateway_order_id,
        payment_id: row.gateway_payment_id,
        signature: row.gateway_signature,
      },
      delivery_otp: row.delivery_otp,
      delivery_otp_verified: row.delivery_otp_verified,
      refund: RefundRecord {
        status: row.refund_status.parse::<RefundStatus>().map_err(corrupt)?,
        refund_id: row.refund_id,
        amount: row.refund_amount,
      },
      created_at: row.created_at,
      updated_at: row.updated_at,
    })
  }
}

const ORDER_COLUMNS: &str = "id, user_id, items, total_amount, payment_method, payment_status, status, \
  delivery_address, customer, delivery_agent_id, gateway_order_id, gateway_payment_id, gateway_signature, \
  delivery_otp, delivery_otp_verified, refund_status, refund_id, refund_amount, created_at, updated_at";

#[derive(Clone)]
pub struct PgOrderRepository {
  pool: PgPool,
}

impl PgOrderRepository {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  async fn fetch_one_where(&self, clause: &str, value: &str) -> Result<Option<Order>> {
    let sql = format!("SELECT {} FROM orders WHERE {} = $1", ORDER_COLUMNS, clause);
    let row = sqlx::query_as::<_, OrderRow>(&sql)
      .bind(value)
      .fetch_optional(&self.pool)
      .await?;
    row.map(Order::try_from).transpose()
  }

  async fn fetch_many(&self, sql_tail: &str, id: Option<Uuid>) -> Result<Vec<Order>> {
    let sql = format!("SELECT {} FROM orders {} ORDER BY created_at DESC", ORDER_COLUMNS, sql_tail);
    let mut query = sqlx::query_as::<_, OrderRow>(&sql);
    if let Some(id) = id {
      query = query.bind(id);
    }
    query
      .fetch_all(&self.pool)
      .await?
      .into_iter()
      .map(Order::try_from)
      .collect()
  }
}

fn map_unique_violation(err: sqlx::Error) -> AppError {
  match &err {
    sqlx::Error::Database(db) if db.is_unique_violation() => {
      AppError::Conflict("An order already exists for this payment".to_string())
    }
    _ => AppError::Sqlx(err),
  }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
  #[instrument(name = "pg_orders::insert", skip(self, order), fields(order_id = %order.id))]
  async fn insert(&self, order: Order) -> Result<Order> {
    sqlx::query(
      "INSERT INTO orders (id, user_id, items, total_amount, payment_method, payment_status, status, \
       delivery_address, customer, delivery_agent_id, gateway_order_id, gateway_payment_id, gateway_signature, \
       delivery_otp, delivery_otp_verified, refund_status, refund_id, refund_amount, created_at, updated_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)",
    )
    .bind(order.id)
    .bind(order.user_id)
    .bind(Json(&order.items))
    .bind(order.total_amount)
    .bind(order.payment_method.as_str())
    .bind(order.payment_status.as_str())
    .bind(order.status.as_str())
    .bind(&order.delivery_address)
    .bind(Json(&order.customer))
    .bind(order.delivery_agent_id)
    .bind(&order.gateway.order_id)
    .bind(&order.gateway.payment_id)
    .bind(&order.gateway.signature)
    .bind(&order.delivery_otp)
    .bind(order.delivery_otp_verified)
    .bind(order.refund.status.as_str())
    .bind(&order.refund.refund_id)
    .bind(order.refund.amount)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&self.pool)
    .await
    .map_err(map_unique_violation)?;
    debug!("order row inserted");
    Ok(order)
  }

  async fn find(&self, id: Uuid) -> Result<Option<Order>> {
    let sql = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
    let row = sqlx::query_as::<_, OrderRow>(&sql)
      .bind(id)
      .fetch_optional(&self.pool)
      .await?;
    row.map(Order::try_from).transpose()
  }

  async fn find_by_refund_id(&self, refund_id: &str) -> Result<Option<Order>> {
    self.fetch_one_where("refund_id", refund_id).await
  }

  async fn find_by_gateway_payment_id(&self, payment_id: &str) -> Result<Option<Order>> {
    self.fetch_one_where("gateway_payment_id", payment_id).await
  }

  async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
    self.fetch_many("WHERE user_id = $1", Some(user_id)).await
  }

  async fn list_for_agent(&self, agent_id: Uuid) -> Result<Vec<Order>> {
    self.fetch_many("WHERE delivery_agent_id = $1", Some(agent_id)).await
  }

  async fn list_all(&self) -> Result<Vec<Order>> {
    self.fetch_many("", None).await
  }

  #[instrument(name = "pg_orders::update", skip(self, mutation), fields(order_id = %id))]
  async fn update(&self, id: Uuid, mutation: OrderMutation) -> Result<Order> {
    let mut tx = self.pool.begin().await?;
    let sql = format!("SELECT {} FROM orders WHERE id = $1 FOR UPDATE", ORDER_COLUMNS);
    let row = sqlx::query_as::<_, OrderRow>(&sql)
      .bind(id)
      .fetch_optional(&mut *tx)
      .await?
      .ok_or_else(|| AppError::NotFound(format!("Order {} not found", id)))?;
    let mut order = Order::try_from(row)?;
    // Dropping `tx` on a vetoed mutation rolls back and releases the row lock.
    mutation(&mut order)?;
    order.updated_at = Utc::now();

    sqlx::query(
      "UPDATE orders SET payment_status = $2, status = $3, delivery_agent_id = $4, delivery_otp_verified = $5, \
       refund_status = $6, refund_id = $7, refund_amount = $8, updated_at = $9 WHERE id = $1",
    )
    .bind(order.id)
    .bind(order.payment_status.as_str())
    .bind(order.status.as_str())
    .bind(order.delivery_agent_id)
    .bind(order.delivery_otp_verified)
    .bind(order.refund.status.as_str())
    .bind(&order.refund.refund_id)
    .bind(order.refund.amount)
    .bind(order.updated_at)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(order)
  }
}
