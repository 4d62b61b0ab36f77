use std::collections::HashMap;
use std::sync::Arc;

use bazaar_catalog::{CatalogEntry, CatalogLookup, PriceLine, PricingEngine};
use bazaar_core::Principal;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::confirmation::ConfirmationMailer;
use crate::error::OrderError;
use crate::models::{Order, OrderItem, OrderWithOwner, PaymentResult};
use crate::repository::OrderRepository;
use crate::request::NewOrder;

/// Manages order lifecycle and state transitions.
///
/// ```text
/// Created(unpaid) --mark_paid--> Paid --mark_delivered--> Delivered
///        \__________________mark_delivered_______________/
/// any state --delete--> (gone)
/// ```
pub struct OrderManager {
    orders: Arc<dyn OrderRepository>,
    catalog: Arc<dyn CatalogLookup>,
    pricing: PricingEngine,
    confirmations: Option<ConfirmationMailer>,
}

impl OrderManager {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        catalog: Arc<dyn CatalogLookup>,
        pricing: PricingEngine,
    ) -> Self {
        Self {
            orders,
            catalog,
            pricing,
            confirmations: None,
        }
    }

    pub fn with_confirmations(mut self, mailer: ConfirmationMailer) -> Self {
        self.confirmations = Some(mailer);
        self
    }

    /// Create a new order, re-priced against the catalog.
    ///
    /// Every referenced product must resolve; otherwise nothing is persisted.
    pub async fn create_order(
        &self,
        requester: Option<&Principal>,
        new_order: NewOrder,
    ) -> Result<Order, OrderError> {
        let requester = requester.ok_or(OrderError::Unauthenticated)?;

        if new_order.items.is_empty() {
            return Err(OrderError::ValidationFailed("No order items".into()));
        }
        if new_order.items.iter().any(|line| line.quantity == 0) {
            return Err(OrderError::ValidationFailed(
                "Quantity must be a positive number".into(),
            ));
        }

        let ids: Vec<Uuid> = new_order.items.iter().map(|line| line.product).collect();
        let catalog: HashMap<Uuid, CatalogEntry> = self
            .catalog
            .find_by_ids(&ids)
            .await
            .map_err(|e| OrderError::internal("catalog lookup", e))?
            .into_iter()
            .map(|entry| (entry.id, entry))
            .collect();

        let mut items = Vec::with_capacity(new_order.items.len());
        for line in new_order.items {
            let entry = catalog
                .get(&line.product)
                .ok_or_else(|| OrderError::NotFound(format!("Product not found: {}", line.product)))?;

            items.push(OrderItem {
                product: entry.id,
                name: entry.name.clone(),
                qty: line.quantity,
                price: entry.price,
                serial_number: entry.serial_number.clone(),
                brand: entry.brand.clone(),
                image: line.image,
            });
        }

        let totals = self
            .pricing
            .order_totals(items.iter().map(|item| PriceLine::new(item.price, item.qty)))
            .map_err(|e| OrderError::ValidationFailed(e.to_string()))?;

        let order = Order::new(
            requester.id,
            items,
            new_order.shipping_address,
            new_order.payment_method,
            totals,
        );

        self.orders
            .insert(&order)
            .await
            .map_err(|e| OrderError::internal("order insert", e))?;

        info!(
            order_id = %order.id,
            user_id = %requester.id,
            items = order.order_items.len(),
            total = %order.total_price,
            "Order created"
        );

        match &self.confirmations {
            Some(mailer) => mailer.send(&order, requester),
            None => warn!(order_id = %order.id, "No confirmation mailer configured"),
        }

        Ok(order)
    }

    /// Transition: → Paid. The payment result is stored as received.
    pub async fn mark_paid(
        &self,
        order_id: Uuid,
        result: PaymentResult,
    ) -> Result<Order, OrderError> {
        let order = self
            .orders
            .mark_paid(order_id, &result, Utc::now())
            .await
            .map_err(|e| OrderError::internal("order update", e))?
            .ok_or_else(|| OrderError::order_not_found(order_id))?;

        info!(order_id = %order_id, delivered = order.is_delivered, "Order marked as paid");
        Ok(order)
    }

    /// Transition: → Delivered. Does not require the order to be paid.
    pub async fn mark_delivered(&self, order_id: Uuid) -> Result<Order, OrderError> {
        let order = self
            .orders
            .mark_delivered(order_id, Utc::now())
            .await
            .map_err(|e| OrderError::internal("order update", e))?
            .ok_or_else(|| OrderError::order_not_found(order_id))?;

        info!(order_id = %order_id, paid = order.is_paid, "Order marked as delivered");
        Ok(order)
    }

    pub async fn delete_order(&self, order_id: Uuid) -> Result<(), OrderError> {
        let deleted = self
            .orders
            .delete(order_id)
            .await
            .map_err(|e| OrderError::internal("order delete", e))?;

        if !deleted {
            return Err(OrderError::order_not_found(order_id));
        }
        info!(order_id = %order_id, "Order deleted");
        Ok(())
    }

    /// Removes every order. Irreversible.
    pub async fn delete_all_orders(&self) -> Result<u64, OrderError> {
        let removed = self
            .orders
            .delete_all()
            .await
            .map_err(|e| OrderError::internal("order bulk delete", e))?;

        warn!(removed, "All orders deleted");
        Ok(removed)
    }

    pub async fn find_order(&self, order_id: Uuid) -> Result<OrderWithOwner, OrderError> {
        self.orders
            .find_with_owner(order_id)
            .await
            .map_err(|e| OrderError::internal("order lookup", e))?
            .ok_or_else(|| OrderError::order_not_found(order_id))
    }

    pub async fn list_orders(&self) -> Result<Vec<OrderWithOwner>, OrderError> {
        self.orders
            .list_with_owner()
            .await
            .map_err(|e| OrderError::internal("order listing", e))
    }

    pub async fn list_orders_for(&self, principal: &Principal) -> Result<Vec<Order>, OrderError> {
        self.orders
            .list_by_owner(principal.id)
            .await
            .map_err(|e| OrderError::internal("order listing", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryOrderRepository;
    use crate::models::{DailySales, ShippingAddress};
    use crate::repository::RepoResult;
    use crate::request::LineRequest;
    use async_trait::async_trait;
    use bazaar_catalog::InMemoryCatalog;
    use bazaar_core::{DispatchPolicy, EmailMessage, NotificationDispatcher, Notifier, NotifyError};
    use chrono::{DateTime, FixedOffset};
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use tokio::sync::{Mutex, Notify};

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    struct Fixture {
        manager: OrderManager,
        repo: Arc<InMemoryOrderRepository>,
        catalog: Arc<InMemoryCatalog>,
        cable: CatalogEntry,
        switch: CatalogEntry,
        buyer: Principal,
    }

    fn fixture() -> Fixture {
        let cable = CatalogEntry::new(Uuid::new_v4(), "Cable", d("10.00"), "SN-CABLE").with_brand("Acme");
        let switch = CatalogEntry::new(Uuid::new_v4(), "Switch", d("5.005"), "SN-SWITCH");
        let repo = Arc::new(InMemoryOrderRepository::new());
        let catalog = Arc::new(InMemoryCatalog::with_entries([cable.clone(), switch.clone()]));
        let manager = OrderManager::new(repo.clone(), catalog.clone(), PricingEngine::default());

        Fixture {
            manager,
            repo,
            catalog,
            cable,
            switch,
            buyer: Principal::new(Uuid::new_v4(), "karim", "karim@example.com"),
        }
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            address: "12 Nile St".into(),
            city: "Cairo".into(),
            postal_code: "11511".into(),
            country: "Egypt".into(),
        }
    }

    fn new_order(lines: &[(Uuid, u32)]) -> NewOrder {
        NewOrder {
            items: lines
                .iter()
                .map(|(product, quantity)| LineRequest {
                    product: *product,
                    quantity: *quantity,
                    image: None,
                })
                .collect(),
            shipping_address: address(),
            payment_method: "PayPal".into(),
        }
    }

    #[tokio::test]
    async fn test_create_order_prices_from_catalog() {
        let f = fixture();

        let order = f
            .manager
            .create_order(Some(&f.buyer), new_order(&[(f.cable.id, 2), (f.switch.id, 1)]))
            .await
            .unwrap();

        assert_eq!(order.user, f.buyer.id);
        assert_eq!(order.order_items[0].price, d("10.00"));
        assert_eq!(order.order_items[0].serial_number, "SN-CABLE");
        assert_eq!(order.order_items[0].brand.as_deref(), Some("Acme"));
        assert_eq!(order.order_items[1].price, d("5.005"));
        assert_eq!(order.items_price, d("25.01"));
        assert_eq!(order.total_price, d("25.01"));
        assert!(!order.is_paid && !order.is_delivered);

        let stored = f.repo.find_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(stored, order);
    }

    #[tokio::test]
    async fn test_order_is_a_price_snapshot() {
        let f = fixture();
        let order = f
            .manager
            .create_order(Some(&f.buyer), new_order(&[(f.cable.id, 1)]))
            .await
            .unwrap();

        f.catalog
            .upsert(CatalogEntry::new(f.cable.id, "Cable", d("99.00"), "SN-CABLE"))
            .await;

        let stored = f.repo.find_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(stored.order_items[0].price, d("10.00"));
        assert_eq!(stored.total_price, d("10.00"));
    }

    #[tokio::test]
    async fn test_create_requires_principal() {
        let f = fixture();
        let err = f
            .manager
            .create_order(None, new_order(&[(f.cable.id, 1)]))
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::Unauthenticated));
        assert_eq!(f.repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_items_persist_nothing() {
        let f = fixture();
        let err = f
            .manager
            .create_order(Some(&f.buyer), new_order(&[]))
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::ValidationFailed(_)));
        assert_eq!(f.repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_zero_quantity_rejected() {
        let f = fixture();
        let err = f
            .manager
            .create_order(Some(&f.buyer), new_order(&[(f.cable.id, 0)]))
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn test_unknown_product_aborts_whole_order() {
        let f = fixture();
        let missing = Uuid::new_v4();

        let err = f
            .manager
            .create_order(Some(&f.buyer), new_order(&[(f.cable.id, 1), (missing, 1)]))
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::NotFound(msg) if msg.contains(&missing.to_string())));
        assert_eq!(f.repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_lines_priced_individually() {
        let f = fixture();
        let order = f
            .manager
            .create_order(Some(&f.buyer), new_order(&[(f.cable.id, 1), (f.cable.id, 3)]))
            .await
            .unwrap();

        assert_eq!(order.order_items.len(), 2);
        assert_eq!(order.total_price, d("40.00"));
    }

    #[tokio::test]
    async fn test_mark_paid_twice_keeps_latest_result() {
        let f = fixture();
        let order = f
            .manager
            .create_order(Some(&f.buyer), new_order(&[(f.cable.id, 1)]))
            .await
            .unwrap();

        let first = PaymentResult { id: Some("PAY-1".into()), ..Default::default() };
        let second = PaymentResult { id: Some("PAY-2".into()), ..Default::default() };

        let paid = f.manager.mark_paid(order.id, first).await.unwrap();
        assert!(paid.is_paid && paid.paid_at.is_some());

        let repaid = f.manager.mark_paid(order.id, second.clone()).await.unwrap();
        assert!(repaid.is_paid);
        assert!(repaid.paid_at >= paid.paid_at);

        let stored = f.repo.find_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_result, Some(second));
    }

    #[tokio::test]
    async fn test_deliver_without_payment_is_allowed() {
        let f = fixture();
        let order = f
            .manager
            .create_order(Some(&f.buyer), new_order(&[(f.cable.id, 1)]))
            .await
            .unwrap();

        let delivered = f.manager.mark_delivered(order.id).await.unwrap();
        assert!(delivered.is_delivered && delivered.delivered_at.is_some());
        assert!(!delivered.is_paid && delivered.paid_at.is_none());
    }

    #[tokio::test]
    async fn test_transitions_on_missing_order_are_not_found() {
        let f = fixture();
        let id = Uuid::new_v4();

        assert!(matches!(
            f.manager.mark_paid(id, PaymentResult::default()).await,
            Err(OrderError::NotFound(_))
        ));
        assert!(matches!(f.manager.mark_delivered(id).await, Err(OrderError::NotFound(_))));
        assert!(matches!(f.manager.delete_order(id).await, Err(OrderError::NotFound(_))));
        assert!(matches!(f.manager.find_order(id).await, Err(OrderError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_and_delete_all() {
        let f = fixture();
        let mut ids = Vec::new();
        for _ in 0..3 {
            let order = f
                .manager
                .create_order(Some(&f.buyer), new_order(&[(f.switch.id, 1)]))
                .await
                .unwrap();
            ids.push(order.id);
        }

        f.manager.delete_order(ids[0]).await.unwrap();
        assert!(f.repo.find_by_id(ids[0]).await.unwrap().is_none());

        assert_eq!(f.manager.delete_all_orders().await.unwrap(), 2);
        assert_eq!(f.repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_listing_resolves_owner_and_filters_mine() {
        let f = fixture();
        f.repo
            .register_owner(crate::models::OrderOwner {
                id: f.buyer.id,
                username: "karim".into(),
                email: "karim@example.com".into(),
            })
            .await;
        let other = Principal::new(Uuid::new_v4(), "mona", "mona@example.com");

        f.manager
            .create_order(Some(&f.buyer), new_order(&[(f.cable.id, 1)]))
            .await
            .unwrap();
        f.manager
            .create_order(Some(&other), new_order(&[(f.cable.id, 1)]))
            .await
            .unwrap();

        let all = f.manager.list_orders().await.unwrap();
        assert_eq!(all.len(), 2);
        let mine = all.iter().find(|o| o.order.user == f.buyer.id).unwrap();
        assert_eq!(mine.owner.as_ref().map(|o| o.username.as_str()), Some("karim"));
        assert!(all.iter().any(|o| o.owner.is_none()));

        let mine = f.manager.list_orders_for(&f.buyer).await.unwrap();
        assert_eq!(mine.len(), 1);
    }

    #[tokio::test]
    async fn test_extreme_catalog_price_is_rejected() {
        let f = fixture();
        let pricey = CatalogEntry::new(Uuid::new_v4(), "Vault", Decimal::MAX, "SN-VAULT");
        f.catalog.upsert(pricey.clone()).await;

        let err = f
            .manager
            .create_order(Some(&f.buyer), new_order(&[(pricey.id, 2)]))
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::ValidationFailed(_)));
        assert_eq!(f.repo.count().await.unwrap(), 0);
    }

    /// Holds every `mark_paid` until released, so another transition can
    /// complete while a payment is in flight.
    struct GatedRepository {
        inner: Arc<InMemoryOrderRepository>,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl OrderRepository for GatedRepository {
        async fn insert(&self, order: &Order) -> RepoResult<()> {
            self.inner.insert(order).await
        }

        async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Order>> {
            self.inner.find_by_id(id).await
        }

        async fn find_with_owner(&self, id: Uuid) -> RepoResult<Option<OrderWithOwner>> {
            self.inner.find_with_owner(id).await
        }

        async fn list_with_owner(&self) -> RepoResult<Vec<OrderWithOwner>> {
            self.inner.list_with_owner().await
        }

        async fn list_by_owner(&self, owner: Uuid) -> RepoResult<Vec<Order>> {
            self.inner.list_by_owner(owner).await
        }

        async fn mark_paid(
            &self,
            id: Uuid,
            result: &PaymentResult,
            at: DateTime<Utc>,
        ) -> RepoResult<Option<Order>> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.mark_paid(id, result, at).await
        }

        async fn mark_delivered(&self, id: Uuid, at: DateTime<Utc>) -> RepoResult<Option<Order>> {
            self.inner.mark_delivered(id, at).await
        }

        async fn delete(&self, id: Uuid) -> RepoResult<bool> {
            self.inner.delete(id).await
        }

        async fn delete_all(&self) -> RepoResult<u64> {
            self.inner.delete_all().await
        }

        async fn count(&self) -> RepoResult<u64> {
            self.inner.count().await
        }

        async fn sum_total_price(&self) -> RepoResult<Decimal> {
            self.inner.sum_total_price().await
        }

        async fn sales_by_day(&self, offset: FixedOffset) -> RepoResult<Vec<DailySales>> {
            self.inner.sales_by_day(offset).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_payment_keeps_delivery() {
        let f = fixture();
        let gated = Arc::new(GatedRepository {
            inner: f.repo.clone(),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let manager = Arc::new(OrderManager::new(
            gated.clone(),
            f.catalog.clone(),
            PricingEngine::default(),
        ));

        let order = manager
            .create_order(Some(&f.buyer), new_order(&[(f.cable.id, 1)]))
            .await
            .unwrap();

        let paying = {
            let manager = manager.clone();
            let id = order.id;
            tokio::spawn(async move { manager.mark_paid(id, PaymentResult::default()).await })
        };

        gated.entered.notified().await;
        manager.mark_delivered(order.id).await.unwrap();
        gated.release.notify_one();

        let paid = paying.await.unwrap().unwrap();
        assert!(paid.is_paid && paid.is_delivered);

        let stored = f.repo.find_by_id(order.id).await.unwrap().unwrap();
        assert!(stored.is_paid && stored.paid_at.is_some());
        assert!(stored.is_delivered && stored.delivered_at.is_some());
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
            self.sent.lock().await.push(message.clone());
            Ok(())
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn send(&self, _message: &EmailMessage) -> Result<(), NotifyError> {
            Err(NotifyError::Transport("smtp down".into()))
        }
    }

    fn quick_policy() -> DispatchPolicy {
        DispatchPolicy {
            max_attempts: 2,
            initial_backoff: std::time::Duration::from_millis(1),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_confirmation_sent_to_buyer_and_sales_inbox() {
        let f = fixture();
        let notifier = Arc::new(RecordingNotifier::default());
        let (queue, worker) = NotificationDispatcher::spawn(notifier.clone(), quick_policy());
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let manager = OrderManager::new(f.repo.clone(), f.catalog.clone(), PricingEngine::default())
            .with_confirmations(ConfirmationMailer::new(queue, Some("sales@example.com".into()), offset));

        let order = manager
            .create_order(Some(&f.buyer), new_order(&[(f.cable.id, 2)]))
            .await
            .unwrap();
        drop(manager);
        worker.await.unwrap();

        let sent = notifier.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].recipients().collect::<Vec<_>>(),
            vec!["karim@example.com", "sales@example.com"]
        );
        assert!(sent[0].body.contains(&order.id.to_string()));
        assert!(sent[0].body.contains("Acme"));
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_fail_creation() {
        let f = fixture();
        let (queue, worker) = NotificationDispatcher::spawn(Arc::new(FailingNotifier), quick_policy());
        let manager = OrderManager::new(f.repo.clone(), f.catalog.clone(), PricingEngine::default())
            .with_confirmations(ConfirmationMailer::new(queue, None, FixedOffset::east_opt(0).unwrap()));

        let order = manager
            .create_order(Some(&f.buyer), new_order(&[(f.cable.id, 1)]))
            .await;
        assert!(order.is_ok());
        drop(manager);

        let stats = worker.await.unwrap();
        assert_eq!(stats.dropped, 1);
        assert_eq!(f.repo.count().await.unwrap(), 1);
    }
}
