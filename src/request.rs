// Request generations - drop responses that arrive after the view moved on
//
// Every list fetch takes a ticket. Only the most recently issued ticket may
// write into the view; closing a dialog or switching bucket invalidates
// whatever is still in flight. Two quick searches that resolve out of order
// therefore leave the newer result on screen.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestTicket(u64);

impl RequestTicket {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Response belonged to the latest request and was written to the view
    Fresh,
    /// Response was superseded and discarded
    Stale,
}

#[derive(Debug, Default)]
pub struct RequestTracker {
    latest: u64,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self) -> RequestTicket {
        self.latest += 1;
        RequestTicket(self.latest)
    }

    /// Make every outstanding ticket stale without issuing a new one.
    pub fn invalidate(&mut self) {
        self.latest += 1;
    }

    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        ticket.0 == self.latest
    }
}
