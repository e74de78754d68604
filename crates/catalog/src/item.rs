use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use supplyline_core::{Aggregate, AggregateRoot, DomainError, aggregate_id};
use supplyline_events::Event;

aggregate_id!(
    /// Supply item identifier (internal identity; the SKU is the business key).
    SupplyItemId
);

/// Catalog lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Active,
    Inactive,
    Discontinued,
}

/// Descriptive, manager-editable attributes of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetails {
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub unit_of_measure: String,
    /// Quantity at or below which the item needs reordering.
    pub reorder_level: i64,
    /// Cost in smallest currency unit (e.g., cents).
    pub unit_cost: u64,
    pub lead_time_days: u32,
    pub expiration_date: Option<NaiveDate>,
}

impl ItemDetails {
    fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.category.trim().is_empty() {
            return Err(DomainError::validation("category cannot be empty"));
        }
        if self.unit_of_measure.trim().is_empty() {
            return Err(DomainError::validation("unit_of_measure cannot be empty"));
        }
        if self.reorder_level < 0 {
            return Err(DomainError::validation("reorder_level cannot be negative"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDirection {
    Increase,
    Decrease,
}

/// Why stock moves. The reason determines the direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockMovement {
    /// Goods received from a supplier.
    Receipt,
    /// Manual issue out of stock.
    Issue,
    /// Quantity reserved by a newly created customer request.
    RequestReservation,
    /// Reserved quantity credited back when a request is rejected.
    RequestRelease,
}

impl StockMovement {
    pub fn direction(&self) -> StockDirection {
        match self {
            StockMovement::Receipt | StockMovement::RequestRelease => StockDirection::Increase,
            StockMovement::Issue | StockMovement::RequestReservation => StockDirection::Decrease,
        }
    }

    fn signed(&self, quantity: i64) -> i64 {
        match self.direction() {
            StockDirection::Increase => quantity,
            StockDirection::Decrease => -quantity,
        }
    }
}

/// Aggregate root: SupplyItem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplyItem {
    id: SupplyItemId,
    sku: String,
    details: ItemDetails,
    quantity: i64,
    status: ItemStatus,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl SupplyItem {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: SupplyItemId) -> Self {
        Self {
            id,
            sku: String::new(),
            details: ItemDetails {
                name: String::new(),
                description: None,
                category: String::new(),
                unit_of_measure: String::new(),
                reorder_level: 0,
                unit_cost: 0,
                lead_time_days: 0,
                expiration_date: None,
            },
            quantity: 0,
            status: ItemStatus::Active,
            created_at: None,
            updated_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SupplyItemId {
        self.id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.details.name
    }

    pub fn details(&self) -> &ItemDetails {
        &self.details
    }

    /// Available stock in the shared pool. Never negative.
    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Only active items accept new customer requests.
    pub fn is_requestable(&self) -> bool {
        self.status == ItemStatus::Active
    }

    pub fn needs_reorder(&self) -> bool {
        self.quantity <= self.details.reorder_level
    }
}

impl AggregateRoot for SupplyItem {
    type Id = SupplyItemId;

    const AGGREGATE_TYPE: &'static str = "catalog.item";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateItem {
    pub item_id: SupplyItemId,
    pub sku: String,
    pub details: ItemDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateDetails (replaces all descriptive attributes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDetails {
    pub item_id: SupplyItemId,
    pub details: ItemDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeStatus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatus {
    pub item_id: SupplyItemId,
    pub status: ItemStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MoveStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveStock {
    pub item_id: SupplyItemId,
    pub movement: StockMovement,
    /// Always positive; the movement decides the sign.
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplyItemCommand {
    CreateItem(CreateItem),
    UpdateDetails(UpdateDetails),
    ChangeStatus(ChangeStatus),
    MoveStock(MoveStock),
}

/// Event: ItemCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCreated {
    pub item_id: SupplyItemId,
    pub sku: String,
    pub details: ItemDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemDetailsUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetailsUpdated {
    pub item_id: SupplyItemId,
    pub details: ItemDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStatusChanged {
    pub item_id: SupplyItemId,
    pub from: ItemStatus,
    pub to: ItemStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockMoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMoved {
    pub item_id: SupplyItemId,
    pub movement: StockMovement,
    pub quantity: i64,
    /// Resulting on-hand quantity (for consumers that only see events).
    pub quantity_after: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplyItemEvent {
    ItemCreated(ItemCreated),
    ItemDetailsUpdated(ItemDetailsUpdated),
    ItemStatusChanged(ItemStatusChanged),
    StockMoved(StockMoved),
}

impl Event for SupplyItemEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SupplyItemEvent::ItemCreated(_) => "catalog.item.created",
            SupplyItemEvent::ItemDetailsUpdated(_) => "catalog.item.details_updated",
            SupplyItemEvent::ItemStatusChanged(_) => "catalog.item.status_changed",
            SupplyItemEvent::StockMoved(_) => "catalog.item.stock_moved",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SupplyItemEvent::ItemCreated(e) => e.occurred_at,
            SupplyItemEvent::ItemDetailsUpdated(e) => e.occurred_at,
            SupplyItemEvent::ItemStatusChanged(e) => e.occurred_at,
            SupplyItemEvent::StockMoved(e) => e.occurred_at,
        }
    }
}

impl Aggregate for SupplyItem {
    type Command = SupplyItemCommand;
    type Event = SupplyItemEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SupplyItemEvent::ItemCreated(e) => {
                self.id = e.item_id;
                self.sku = e.sku.clone();
                self.details = e.details.clone();
                self.quantity = 0;
                self.status = ItemStatus::Active;
                self.created_at = Some(e.occurred_at);
                self.updated_at = Some(e.occurred_at);
                self.created = true;
            }
            SupplyItemEvent::ItemDetailsUpdated(e) => {
                self.details = e.details.clone();
                self.updated_at = Some(e.occurred_at);
            }
            SupplyItemEvent::ItemStatusChanged(e) => {
                self.status = e.to;
                self.updated_at = Some(e.occurred_at);
            }
            SupplyItemEvent::StockMoved(e) => {
                self.quantity += e.movement.signed(e.quantity);
                self.updated_at = Some(e.occurred_at);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SupplyItemCommand::CreateItem(cmd) => self.handle_create(cmd),
            SupplyItemCommand::UpdateDetails(cmd) => self.handle_update(cmd),
            SupplyItemCommand::ChangeStatus(cmd) => self.handle_change_status(cmd),
            SupplyItemCommand::MoveStock(cmd) => self.handle_move_stock(cmd),
        }
    }
}

impl SupplyItem {
    fn ensure_existing(&self, item_id: SupplyItemId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("supply item {item_id}")));
        }
        if self.id != item_id {
            return Err(DomainError::consistency("item_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateItem) -> Result<Vec<SupplyItemEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("item already exists"));
        }
        if cmd.sku.trim().is_empty() {
            return Err(DomainError::validation("item_id (sku) cannot be empty"));
        }
        cmd.details.validate()?;

        Ok(vec![SupplyItemEvent::ItemCreated(ItemCreated {
            item_id: cmd.item_id,
            sku: cmd.sku.trim().to_string(),
            details: cmd.details.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateDetails) -> Result<Vec<SupplyItemEvent>, DomainError> {
        self.ensure_existing(cmd.item_id)?;
        cmd.details.validate()?;

        Ok(vec![SupplyItemEvent::ItemDetailsUpdated(ItemDetailsUpdated {
            item_id: cmd.item_id,
            details: cmd.details.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_status(
        &self,
        cmd: &ChangeStatus,
    ) -> Result<Vec<SupplyItemEvent>, DomainError> {
        self.ensure_existing(cmd.item_id)?;

        if self.status == cmd.status {
            return Err(DomainError::invalid_state(format!(
                "item is already {:?}",
                cmd.status
            )));
        }

        Ok(vec![SupplyItemEvent::ItemStatusChanged(ItemStatusChanged {
            item_id: cmd.item_id,
            from: self.status,
            to: cmd.status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_move_stock(&self, cmd: &MoveStock) -> Result<Vec<SupplyItemEvent>, DomainError> {
        self.ensure_existing(cmd.item_id)?;

        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        match cmd.movement {
            StockMovement::RequestReservation if !self.is_requestable() => {
                return Err(DomainError::invalid_state(format!(
                    "item {} is {:?} and cannot be requested",
                    self.sku, self.status
                )));
            }
            StockMovement::Receipt if self.status == ItemStatus::Discontinued => {
                return Err(DomainError::invalid_state(format!(
                    "item {} is discontinued and cannot receive stock",
                    self.sku
                )));
            }
            _ => {}
        }

        let quantity_after = self
            .quantity
            .checked_add(cmd.movement.signed(cmd.quantity))
            .ok_or_else(|| DomainError::validation("quantity overflow"))?;
        if quantity_after < 0 {
            return Err(DomainError::insufficient_stock(
                &self.sku,
                cmd.quantity,
                self.quantity,
            ));
        }

        Ok(vec![SupplyItemEvent::StockMoved(StockMoved {
            item_id: cmd.item_id,
            movement: cmd.movement,
            quantity: cmd.quantity,
            quantity_after,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_item_id() -> SupplyItemId {
        SupplyItemId::generate()
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn test_details() -> ItemDetails {
        ItemDetails {
            name: "Nitrile Gloves".to_string(),
            description: Some("Box of 100".to_string()),
            category: "PPE".to_string(),
            unit_of_measure: "box".to_string(),
            reorder_level: 10,
            unit_cost: 1_250,
            lead_time_days: 7,
            expiration_date: None,
        }
    }

    fn created_item(item_id: SupplyItemId) -> SupplyItem {
        let mut item = SupplyItem::empty(item_id);
        let events = item
            .handle(&SupplyItemCommand::CreateItem(CreateItem {
                item_id,
                sku: "PPE-GLV-100".to_string(),
                details: test_details(),
                occurred_at: test_time(),
            }))
            .unwrap();
        item.apply(&events[0]);
        item
    }

    fn move_stock(item: &mut SupplyItem, movement: StockMovement, quantity: i64) -> Result<(), DomainError> {
        let cmd = SupplyItemCommand::MoveStock(MoveStock {
            item_id: item.id_typed(),
            movement,
            quantity,
            occurred_at: test_time(),
        });
        let events = item.handle(&cmd)?;
        for e in &events {
            item.apply(e);
        }
        Ok(())
    }

    #[test]
    fn create_item_starts_active_with_zero_stock() {
        let item_id = test_item_id();
        let item = created_item(item_id);

        assert_eq!(item.quantity(), 0);
        assert_eq!(item.status(), ItemStatus::Active);
        assert_eq!(item.sku(), "PPE-GLV-100");
        assert_eq!(item.version(), 1);
    }

    #[test]
    fn create_item_rejects_blank_sku_and_name() {
        let item_id = test_item_id();
        let item = SupplyItem::empty(item_id);

        let err = item
            .handle(&SupplyItemCommand::CreateItem(CreateItem {
                item_id,
                sku: "  ".to_string(),
                details: test_details(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let mut details = test_details();
        details.name = String::new();
        let err = item
            .handle(&SupplyItemCommand::CreateItem(CreateItem {
                item_id,
                sku: "X-1".to_string(),
                details,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("name")));
    }

    #[test]
    fn create_item_twice_conflicts() {
        let item_id = test_item_id();
        let item = created_item(item_id);
        let err = item
            .handle(&SupplyItemCommand::CreateItem(CreateItem {
                item_id,
                sku: "PPE-GLV-100".to_string(),
                details: test_details(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn receipt_increases_and_reservation_decreases() {
        let mut item = created_item(test_item_id());

        move_stock(&mut item, StockMovement::Receipt, 50).unwrap();
        assert_eq!(item.quantity(), 50);

        move_stock(&mut item, StockMovement::RequestReservation, 20).unwrap();
        assert_eq!(item.quantity(), 30);

        move_stock(&mut item, StockMovement::RequestRelease, 20).unwrap();
        assert_eq!(item.quantity(), 50);

        move_stock(&mut item, StockMovement::Issue, 50).unwrap();
        assert_eq!(item.quantity(), 0);
    }

    #[test]
    fn decrease_beyond_stock_is_insufficient_and_emits_nothing() {
        let mut item = created_item(test_item_id());
        move_stock(&mut item, StockMovement::Receipt, 50).unwrap();
        let version = item.version();

        let err = move_stock(&mut item, StockMovement::RequestReservation, 999).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                item: "PPE-GLV-100".to_string(),
                requested: 999,
                available: 50,
            }
        );
        assert_eq!(item.quantity(), 50);
        assert_eq!(item.version(), version);
    }

    #[test]
    fn non_positive_quantity_is_validation_error() {
        let mut item = created_item(test_item_id());
        for q in [0, -5] {
            let err = move_stock(&mut item, StockMovement::Receipt, q).unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)));
        }
    }

    #[test]
    fn inactive_item_cannot_be_requested() {
        let mut item = created_item(test_item_id());
        move_stock(&mut item, StockMovement::Receipt, 5).unwrap();

        let events = item
            .handle(&SupplyItemCommand::ChangeStatus(ChangeStatus {
                item_id: item.id_typed(),
                status: ItemStatus::Inactive,
                occurred_at: test_time(),
            }))
            .unwrap();
        item.apply(&events[0]);

        let err = move_stock(&mut item, StockMovement::RequestReservation, 1).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
        // Manual issue is still allowed for inactive items.
        move_stock(&mut item, StockMovement::Issue, 1).unwrap();
    }

    #[test]
    fn status_change_to_same_status_is_rejected() {
        let item = created_item(test_item_id());
        let err = item
            .handle(&SupplyItemCommand::ChangeStatus(ChangeStatus {
                item_id: item.id_typed(),
                status: ItemStatus::Active,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn commands_on_missing_item_are_not_found() {
        let item_id = test_item_id();
        let item = SupplyItem::empty(item_id);
        let err = item
            .handle(&SupplyItemCommand::MoveStock(MoveStock {
                item_id,
                movement: StockMovement::Receipt,
                quantity: 1,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn needs_reorder_at_or_below_level() {
        let mut item = created_item(test_item_id());
        assert!(item.needs_reorder());
        move_stock(&mut item, StockMovement::Receipt, 11).unwrap();
        assert!(!item.needs_reorder());
        move_stock(&mut item, StockMovement::Issue, 1).unwrap();
        assert!(item.needs_reorder());
    }

    fn movement_strategy() -> impl Strategy<Value = StockMovement> {
        prop_oneof![
            Just(StockMovement::Receipt),
            Just(StockMovement::Issue),
            Just(StockMovement::RequestReservation),
            Just(StockMovement::RequestRelease),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: no sequence of stock movements drives quantity negative,
        /// and rejected movements leave the item untouched.
        #[test]
        fn quantity_never_negative(
            moves in prop::collection::vec((movement_strategy(), 1i64..200i64), 1..40)
        ) {
            let mut item = created_item(test_item_id());

            for (movement, quantity) in moves {
                let before = item.clone();
                match move_stock(&mut item, movement, quantity) {
                    Ok(()) => {}
                    Err(DomainError::InsufficientStock { .. }) => {
                        prop_assert_eq!(&item, &before);
                    }
                    Err(other) => prop_assert!(false, "unexpected error: {other:?}"),
                }
                prop_assert!(item.quantity() >= 0);
            }
        }
    }
}
