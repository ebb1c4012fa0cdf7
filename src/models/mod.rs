pub mod film;
pub mod hall;
pub mod session;
pub mod ticket;

pub use film::Film;
pub use hall::Hall;
pub use session::SessionDetails;
pub use ticket::{Ticket, TicketDetails};
