pub mod blood_requests;
pub mod credits;
pub mod donations;
pub mod donors;
