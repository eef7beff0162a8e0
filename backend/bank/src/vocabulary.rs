//! Food types.
//!
//! Index in [`FOOD_TYPES`] is the feature position for that tag. Append only: reordering or removing an entry
//! silently reinterprets every stored preference vector.
pub const FOOD_TYPES: [&str; 18] = [
    "American Foods",
    "Taiwanese Foods",
    "Fast Foods",
    "Thai Foods",
    "Soup",
    "Pizza",
    "Desserts",
    "Street Foods",
    "Drinks",
    "Cafe",
    "BBQ",
    "Indian Foods",
    "Hong Kong Style Foods",
    "Vegetarian Diet",
    "Breakfast",
    "Korean Foods",
    "Italian Foods",
    "Seafood",
];
