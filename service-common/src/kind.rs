use std::fmt;

/// The members of the fleet. They share one service contract and differ only in identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    User,
    Order,
    Restaurant,
}

impl ServiceKind {
    /// Human-readable name, as served by the root endpoint.
    pub fn display_name(&self) -> &'static str {
        match self {
            ServiceKind::User => "User Service",
            ServiceKind::Order => "Order Service",
            ServiceKind::Restaurant => "Restaurant Service",
        }
    }

    /// Name used in logs and metric labels.
    pub fn slug(&self) -> &'static str {
        match self {
            ServiceKind::User => "user-service",
            ServiceKind::Order => "order-service",
            ServiceKind::Restaurant => "restaurant-service",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}
