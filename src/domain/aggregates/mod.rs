//! Aggregates module
pub mod product;
pub mod order;
pub mod promo;
pub mod review;
pub mod support;
pub mod cart;
pub mod saved;

pub use product::{Product, ProductImage, ProductSpec};
pub use order::{CustomerContact, Lifecycle, Order, OrderItem, OrderStatus, OrderTotals, PaymentStatus, SideEffect, Transition};
pub use promo::{AppliedPromo, DiscountType, PromoCode, PromoRejection};
pub use review::{FixedReplyPicker, RandomReplyPicker, ReplyPicker, Review, AUTO_REPLIES};
pub use support::{Author, ChatStatus, SupportChat, SupportMessage};
pub use cart::{Cart, CartItem, CheckoutLine};
pub use saved::{CompareList, Wishlist, MAX_COMPARE};
