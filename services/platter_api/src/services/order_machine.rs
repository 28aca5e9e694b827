// services/platter_api/src/services/order_machine.rs

//! Order status authority. Who may move an order where is decided here and
//! nowhere else; handlers and flows only call [`apply_transition`].

use crate::errors::{AppError, Result};
use crate::models::{Order, OrderStatus, PaymentMethod, PaymentStatus, Role};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRole {
  Admin,
  DeliveryAgent,
  User,
}

impl From<Role> for ActorRole {
  fn from(role: Role) -> Self {
    match role {
      Role::Admin => ActorRole::Admin,
      Role::DeliveryAgent => ActorRole::DeliveryAgent,
      Role::User => ActorRole::User,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
  pub role: ActorRole,
  pub id: Uuid,
}

impl Actor {
  pub fn new(role: ActorRole, id: Uuid) -> Self {
    Self { role, id }
  }
}

const FROM_PLACED: &[OrderStatus] = &[OrderStatus::Preparing, OrderStatus::Cancelled];
const FROM_PREPARING: &[OrderStatus] = &[OrderStatus::OutForDelivery, OrderStatus::Cancelled];
const FROM_OUT_FOR_DELIVERY: &[OrderStatus] = &[OrderStatus::Delivered, OrderStatus::Cancelled];
const DELIVERED_ONLY: &[OrderStatus] = &[OrderStatus::Delivered];
const NONE: &[OrderStatus] = &[];

/// The forward lifecycle of an order, independent of who drives it.
pub fn lifecycle_successors(current: OrderStatus) -> &'static [OrderStatus] {
  match current {
    OrderStatus::Placed => FROM_PLACED,
    OrderStatus::Preparing => FROM_PREPARING,
    OrderStatus::OutForDelivery => FROM_OUT_FOR_DELIVERY,
    OrderStatus::Delivered | OrderStatus::Cancelled => NONE,
  }
}

/// True when `from -> to` is a forward lifecycle edge. Anything else an admin
/// sets is a correction.
pub fn follows_lifecycle(from: OrderStatus, to: OrderStatus) -> bool {
  lifecycle_successors(from).contains(&to)
}

/// Statuses `role` may set on an order currently at `current`.
///
/// Admins may set any status, including corrections out of terminal states.
/// Delivery agents may only mark a live order delivered; the assignment
/// check happens in [`apply_transition`] since it needs the order.
pub fn allowed_next(current: OrderStatus, role: ActorRole) -> &'static [OrderStatus] {
  match role {
    ActorRole::Admin => &OrderStatus::ALL,
    ActorRole::DeliveryAgent if !current.is_terminal() => DELIVERED_ONLY,
    ActorRole::DeliveryAgent | ActorRole::User => NONE,
  }
}

/// Validates and applies a status change in place.
///
/// Runs inside the repository's atomic update so the checks and the write
/// see the same row.
pub fn apply_transition(order: &mut Order, actor: &Actor, target: OrderStatus, otp: Option<&str>) -> Result<()> {
  if !allowed_next(order.status, actor.role).contains(&target) {
    return Err(AppError::Forbidden(format!(
      "cannot move order from {} to {}",
      order.status, target
    )));
  }

  if actor.role == ActorRole::DeliveryAgent {
    if order.delivery_agent_id != Some(actor.id) {
      return Err(AppError::Forbidden("order is not assigned to you".to_string()));
    }
    if let Some(expected) = order.delivery_otp.as_deref() {
      match otp {
        Some(provided) if provided.trim() == expected => order.delivery_otp_verified = true,
        Some(_) => return Err(AppError::Validation("Invalid delivery OTP".to_string())),
        None => return Err(AppError::Validation("Delivery OTP is required".to_string())),
      }
    }
  }

  if !follows_lifecycle(order.status, target) && order.status != target {
    warn!(
      order_id = %order.id,
      from = %order.status,
      to = %target,
      admin_id = %actor.id,
      "admin correction outside the order lifecycle"
    );
  }
  order.status = target;
  if target == OrderStatus::Delivered && order.payment_method == PaymentMethod::Cod {
    order.payment_status = PaymentStatus::Paid;
  }
  Ok(())
}

/// Admin-only: hands an order to a delivery agent.
pub fn assign_agent(order: &mut Order, actor: &Actor, agent_id: Uuid) -> Result<()> {
  if actor.role != ActorRole::Admin {
    return Err(AppError::Forbidden("only admins assign delivery agents".to_string()));
  }
  if order.status.is_terminal() {
    return Err(AppError::Validation(format!("order is already {}", order.status)));
  }
  order.delivery_agent_id = Some(agent_id);
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::{CustomerContact, GatewayRefs, OrderDraft, OrderItem};
  use rust_decimal::Decimal;

  fn draft() -> OrderDraft {
    OrderDraft {
      user_id: Uuid::new_v4(),
      customer: CustomerContact {
        name: "Mira".into(),
        phone: "9111111111".into(),
      },
      items: vec![OrderItem {
        product_id: "dosa".into(),
        name: "Masala Dosa".into(),
        quantity: 2,
        unit_price: Decimal::from(120),
      }],
      total_amount: Decimal::from(240),
      delivery_address: "12 Hill Street".into(),
    }
  }

  fn online_order(status: OrderStatus, agent: Option<Uuid>) -> Order {
    let mut order = Order::paid_online(draft(), GatewayRefs::default(), "042517".into());
    order.status = status;
    order.delivery_agent_id = agent;
    order
  }

  #[test]
  fn lifecycle_is_linear_with_cancel_from_live_states() {
    assert_eq!(
      lifecycle_successors(OrderStatus::Placed),
      &[OrderStatus::Preparing, OrderStatus::Cancelled]
    );
    assert_eq!(
      lifecycle_successors(OrderStatus::OutForDelivery),
      &[OrderStatus::Delivered, OrderStatus::Cancelled]
    );
    assert!(lifecycle_successors(OrderStatus::Delivered).is_empty());
    assert!(lifecycle_successors(OrderStatus::Cancelled).is_empty());
  }

  #[test]
  fn corrections_are_off_lifecycle() {
    assert!(follows_lifecycle(OrderStatus::Placed, OrderStatus::Preparing));
    assert!(follows_lifecycle(OrderStatus::Preparing, OrderStatus::Cancelled));
    assert!(!follows_lifecycle(OrderStatus::Placed, OrderStatus::Delivered));
    assert!(!follows_lifecycle(OrderStatus::Delivered, OrderStatus::Placed));
    assert!(!follows_lifecycle(OrderStatus::Cancelled, OrderStatus::Cancelled));

    // Corrections still go through for admins.
    let mut order = online_order(OrderStatus::Delivered, None);
    let admin = Actor::new(ActorRole::Admin, Uuid::new_v4());
    apply_transition(&mut order, &admin, OrderStatus::Preparing, None).unwrap();
    assert_eq!(order.status, OrderStatus::Preparing);
  }

  #[test]
  fn allowed_next_table_per_role() {
    for current in OrderStatus::ALL {
      assert_eq!(allowed_next(current, ActorRole::Admin), &OrderStatus::ALL);
      assert!(allowed_next(current, ActorRole::User).is_empty());
      let agent = allowed_next(current, ActorRole::DeliveryAgent);
      if current.is_terminal() {
        assert!(agent.is_empty(), "{current} should be closed to agents");
      } else {
        assert_eq!(agent, &[OrderStatus::Delivered]);
      }
    }
  }

  #[test]
  fn every_role_and_status_pair_obeys_the_table() {
    let agent_id = Uuid::new_v4();
    let roles = [ActorRole::Admin, ActorRole::DeliveryAgent, ActorRole::User];
    for current in OrderStatus::ALL {
      for role in roles {
        for target in OrderStatus::ALL {
          let mut order = online_order(current, Some(agent_id));
          let actor = Actor::new(role, agent_id);
          let result = apply_transition(&mut order, &actor, target, Some("042517"));
          let expected = allowed_next(current, role).contains(&target);
          assert_eq!(result.is_ok(), expected, "{role:?} {current} -> {target}");
          if !expected {
            assert!(matches!(result, Err(AppError::Forbidden(_))));
            assert_eq!(order.status, current);
          }
        }
      }
    }
  }

  #[test]
  fn agent_must_be_the_assigned_one() {
    let mut order = online_order(OrderStatus::OutForDelivery, Some(Uuid::new_v4()));
    let stranger = Actor::new(ActorRole::DeliveryAgent, Uuid::new_v4());
    let result = apply_transition(&mut order, &stranger, OrderStatus::Delivered, Some("042517"));
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let mut unassigned = online_order(OrderStatus::OutForDelivery, None);
    let result = apply_transition(&mut unassigned, &stranger, OrderStatus::Delivered, Some("042517"));
    assert!(matches!(result, Err(AppError::Forbidden(_))));
  }

  #[test]
  fn agent_delivery_checks_otp() {
    let agent_id = Uuid::new_v4();
    let agent = Actor::new(ActorRole::DeliveryAgent, agent_id);

    let mut order = online_order(OrderStatus::OutForDelivery, Some(agent_id));
    let wrong = apply_transition(&mut order, &agent, OrderStatus::Delivered, Some("000000"));
    assert!(matches!(wrong, Err(AppError::Validation(_))));
    let missing = apply_transition(&mut order, &agent, OrderStatus::Delivered, None);
    assert!(matches!(missing, Err(AppError::Validation(_))));
    assert_eq!(order.status, OrderStatus::OutForDelivery);
    assert!(!order.delivery_otp_verified);

    apply_transition(&mut order, &agent, OrderStatus::Delivered, Some("042517")).unwrap();
    assert_eq!(order.status, OrderStatus::Delivered);
    assert!(order.delivery_otp_verified);
  }

  #[test]
  fn delivering_cod_marks_it_paid() {
    let agent_id = Uuid::new_v4();
    let mut order = Order::cash_on_delivery(draft());
    order.status = OrderStatus::OutForDelivery;
    order.delivery_agent_id = Some(agent_id);
    assert_eq!(order.payment_status, PaymentStatus::Pending);

    // COD orders carry no OTP.
    apply_transition(&mut order, &Actor::new(ActorRole::DeliveryAgent, agent_id), OrderStatus::Delivered, None).unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Paid);
  }

  #[test]
  fn admin_cancel_leaves_payment_alone() {
    let mut order = Order::cash_on_delivery(draft());
    let admin = Actor::new(ActorRole::Admin, Uuid::new_v4());
    apply_transition(&mut order, &admin, OrderStatus::Cancelled, None).unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
  }

  #[test]
  fn only_admins_assign() {
    let mut order = online_order(OrderStatus::Placed, None);
    let agent_id = Uuid::new_v4();
    let user = Actor::new(ActorRole::User, Uuid::new_v4());
    assert!(matches!(assign_agent(&mut order, &user, agent_id), Err(AppError::Forbidden(_))));
    assign_agent(&mut order, &Actor::new(ActorRole::Admin, Uuid::new_v4()), agent_id).unwrap();
    assert_eq!(order.delivery_agent_id, Some(agent_id));
  }
}
