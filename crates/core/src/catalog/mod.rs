pub mod origin;
pub mod pricing;

pub use origin::{country_from_tags, is_domestic_by_tags, is_domestic_country, truthy_flag};
pub use pricing::{parse_price_reply, PriceHeuristics};
