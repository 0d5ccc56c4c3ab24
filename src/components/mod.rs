// Export components
pub mod calendar;
pub mod datastore;

// Re-export the datastore handle
pub use datastore::DatastoreHandle;
