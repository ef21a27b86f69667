use std::sync::Arc;

use crate::config::Config;
use crate::payments::PaymentGateway;
use crate::services::{AttendeeCounter, BookingManager, CheckoutService, ConfirmationService};
use crate::store::{AttendanceStore, BookingStore, EventStore, UserStore};

/// Shared handler state. Store and gateway handles are injected here by
/// the process entry point (or by tests, with in-memory fakes).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub events: Arc<dyn EventStore>,
    pub bookings: Arc<dyn BookingStore>,
    pub users: Arc<dyn UserStore>,
    pub checkout: Arc<CheckoutService>,
    pub confirmation: Arc<ConfirmationService>,
    pub manager: Arc<BookingManager>,
}

impl AppState {
    pub fn new(
        config: Config,
        events: Arc<dyn EventStore>,
        bookings: Arc<dyn BookingStore>,
        users: Arc<dyn UserStore>,
        attendance: Arc<dyn AttendanceStore>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let counter = AttendeeCounter::new(attendance);
        let checkout = Arc::new(CheckoutService::new(events.clone(), gateway));
        let confirmation = Arc::new(ConfirmationService::new(bookings.clone(), counter.clone()));
        let manager = Arc::new(BookingManager::new(bookings.clone(), counter));

        Self {
            config: Arc::new(config),
            events,
            bookings,
            users,
            checkout,
            confirmation,
            manager,
        }
    }
}
