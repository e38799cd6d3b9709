pub mod ids;
pub mod money;

pub use ids::{BookId, GenreId, OrderId, UserId};
pub use money::Money;
