//! The four tourbook resources: schemas, descriptors and routes

pub mod bookings;
pub mod reviews;
pub mod tours;
pub mod users;

use tourbook_service::prelude::*;

/// Collections in seeding order
pub const COLLECTIONS: [&str; 4] = [
    tours::COLLECTION,
    users::COLLECTION,
    reviews::COLLECTION,
    bookings::COLLECTION,
];

pub fn schemas() -> Vec<CollectionSchema> {
    vec![
        tours::schema(),
        users::schema(),
        reviews::schema(),
        bookings::schema(),
    ]
}

/// An empty store that knows every tourbook collection
pub fn store() -> MemoryStore {
    MemoryStore::with_schemas(schemas())
}
