pub mod companies_house;
pub mod listing;

pub use companies_house::CompaniesHouseAdapter;
pub use listing::ListingAdapter;
