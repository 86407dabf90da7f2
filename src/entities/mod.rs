mod prediction;
mod ride_request;

pub use prediction::{BatchPrediction, Health, Prediction};
pub use ride_request::{
    Field, LocationCategory, LoyaltyStatus, RideRequest, TimeOfBooking, VehicleType,
};
