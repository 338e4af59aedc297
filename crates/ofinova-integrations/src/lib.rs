//! # ofinova-integrations
//!
//! Vendor integrations behind the landing API that are not payments.
//!
//! ## Services
//!
//! - **Airtable**: lead registration upserts
//! - **Supabase Storage**: signed KYC uploads and contract storage
//! - **KYC**: token verification and upload validation
//! - **Contracts**: Handlebars templates printed to PDF by headless Chromium
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ofinova_integrations::{KycConfig, KycService, SupabaseStorage};
//!
//! let storage = SupabaseStorage::from_env()?;
//! let kyc = KycService::new(&KycConfig::from_env());
//! let pending = kyc.prepare_upload(&body)?;
//! let signed = kyc.sign(&storage, pending).await?;
//! ```

pub mod airtable;
pub mod contract;
pub mod error;
pub mod kyc;
pub mod supabase;

pub use airtable::{AirtableClient, AirtableConfig, LeadRecord, LeadRegistration, LeadStore};
pub use contract::{
    ChromiumPrinter, ContractConfig, ContractRenderer, ContractService, Delivery, PdfPrinter,
    StoredContract,
};
pub use error::{IntegrationError, Result};
pub use kyc::{KycConfig, KycOrder, KycService, KycTokenVerifier, PendingUpload, SignedUpload, UploadRequest};
pub use supabase::{ObjectStorage, SupabaseConfig, SupabaseStorage};
