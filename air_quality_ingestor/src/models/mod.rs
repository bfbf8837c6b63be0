pub mod observation;
pub mod place;
pub mod request_params;
pub mod sensor;
pub mod weather;
