pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::core::InvoiceResult;
use crate::models::{
    Client, ClientUpdate, Invoice, InvoiceStatus, InvoiceUpdate, InvoiceWithItems, NewClient,
    NewInvoice, NewInvoiceItem, Profile,
};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Límite de persistencia de facturas.
///
/// Un número de factura vacío lo asigna el almacén (`INV-<año>-<NNNN>`).
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn create_invoice(
        &self,
        invoice: NewInvoice,
        items: Vec<NewInvoiceItem>,
    ) -> InvoiceResult<Invoice>;

    async fn get_invoice(&self, id: &str) -> InvoiceResult<Option<InvoiceWithItems>>;

    /// Más recientes primero.
    async fn list_invoices(&self) -> InvoiceResult<Vec<Invoice>>;

    /// `None` si la factura no existe.
    async fn set_status(&self, id: &str, status: InvoiceStatus) -> InvoiceResult<Option<Invoice>>;

    /// Cambio parcial; `None` si la factura no existe. Un cambio inválido no toca nada.
    async fn update_invoice(
        &self,
        id: &str,
        update: InvoiceUpdate,
    ) -> InvoiceResult<Option<InvoiceWithItems>>;

    async fn delete_invoice(&self, id: &str) -> InvoiceResult<bool>;

    /// Comprobación de salud del almacén.
    async fn ping(&self) -> bool {
        true
    }

    async fn mark_paid(&self, id: &str) -> InvoiceResult<Option<Invoice>> {
        self.set_status(id, InvoiceStatus::Paid).await
    }

    async fn mark_sent(&self, id: &str) -> InvoiceResult<Option<Invoice>> {
        self.set_status(id, InvoiceStatus::Sent).await
    }
}

/// Clientes guardados y perfil del emisor de la cuenta.
#[async_trait]
pub trait ClientDirectory: Send + Sync {
    /// Sólo clientes activos, por nombre.
    async fn list_clients(&self) -> InvoiceResult<Vec<Client>>;

    async fn get_client(&self, id: &str) -> InvoiceResult<Option<Client>>;

    async fn create_client(&self, client: NewClient) -> InvoiceResult<Client>;

    /// `None` si el cliente no existe.
    async fn update_client(&self, id: &str, update: ClientUpdate) -> InvoiceResult<Option<Client>>;

    /// Las facturas ya guardadas conservan su `client_id` y el nombre copiado.
    async fn delete_client(&self, id: &str) -> InvoiceResult<bool>;

    async fn profile(&self) -> InvoiceResult<Option<Profile>>;

    /// Reemplaza el perfil de la cuenta.
    async fn save_profile(&self, profile: Profile) -> InvoiceResult<Profile>;
}
