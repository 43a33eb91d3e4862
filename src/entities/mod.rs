pub mod person;
pub mod product;
pub mod sector;
pub mod stock_entry;
pub mod stock_exit;
pub mod stock_exit_item;
pub mod user;

pub mod prelude {
    pub use super::person::Entity as Person;
    pub use super::product::Entity as Product;
    pub use super::sector::Entity as Sector;
    pub use super::stock_entry::Entity as StockEntry;
    pub use super::stock_exit::Entity as StockExit;
    pub use super::stock_exit_item::Entity as StockExitItem;
    pub use super::user::Entity as User;
}
