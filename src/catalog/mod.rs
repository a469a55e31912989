//! Provider catalog storage.
//!
//! A catalog lists the providers (facilities, kitchens, ...) a requirement set is
//! matched against, each with its normalized capabilities. Catalogs are plain
//! versioned JSON:
//!
//! ```json
//! {
//!   "version": "1.0.0",
//!   "created_at": "2026-01-01T00:00:00Z",
//!   "providers": [
//!     {"id": "fab-lab", "name": "Fab Lab", "capabilities": [{"id": "welding", "name": "Welding"}]}
//!   ]
//! }
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use supply_solver::ProviderCatalog;
//! use supply_solver::core::types::ProviderId;
//! use std::path::Path;
//!
//! let catalog = ProviderCatalog::load_from_file(Path::new("providers.json")).unwrap();
//! for provider in &catalog.providers {
//!     println!("{} offers {} capabilities", provider.id, provider.capabilities.len());
//! }
//! let lab = catalog.get(&ProviderId::new("fab-lab"));
//! ```

pub mod store;
