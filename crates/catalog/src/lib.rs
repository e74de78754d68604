//! Catalog domain module: supply items and their shared stock pool.
//!
//! Business rules only (no IO, no storage). Quantity changes go exclusively
//! through [`MoveStock`], whose [`StockMovement`] fixes the direction.

pub mod item;

pub use item::{
    ChangeStatus, CreateItem, ItemCreated, ItemDetails, ItemDetailsUpdated, ItemStatus,
    ItemStatusChanged, MoveStock, StockDirection, StockMovement, StockMoved, SupplyItem,
    SupplyItemCommand, SupplyItemEvent, SupplyItemId, UpdateDetails,
};
