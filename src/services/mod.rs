// Derived stock and the two ledgers
pub mod stock_entries;
pub mod stock_level;

// Exit transactions
pub mod exit_orders;
pub mod inventory_adjustment;

// Products, sectors and people
pub mod reference_data;

// Read-only aggregates
pub mod reports;
