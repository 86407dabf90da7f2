use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{invalid_input_error, Error};

macro_rules! literal_enum {
    ($name:ident { $($(#[$attr:meta])* $variant:ident),* $(,)? }) => {
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$attr])* $variant),*
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),*];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant)),*
                }
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $(stringify!($variant) => Ok(Self::$variant),)*
                    _ => Err(invalid_input_error()
                        .with_detail(format!("'{}' is not a valid {}", s, stringify!($name)))),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(self.as_str())
            }
        }
    };
}

// `#[default]` marks the value the form starts with.
literal_enum!(LocationCategory { #[default] Urban, Suburban, Rural });
literal_enum!(LoyaltyStatus { Bronze, #[default] Silver, Gold, Platinum });
literal_enum!(TimeOfBooking { #[default] Morning, Afternoon, Evening, Night });
literal_enum!(VehicleType { #[default] Standard, Premium, Luxury });

/// The nine inputs of the pricing form, named by their wire keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    NumberOfRiders,
    NumberOfDrivers,
    LocationCategory,
    CustomerLoyaltyStatus,
    NumberOfPastRides,
    AverageRatings,
    TimeOfBooking,
    VehicleType,
    ExpectedRideDuration,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::NumberOfRiders,
        Field::NumberOfDrivers,
        Field::LocationCategory,
        Field::CustomerLoyaltyStatus,
        Field::NumberOfPastRides,
        Field::AverageRatings,
        Field::TimeOfBooking,
        Field::VehicleType,
        Field::ExpectedRideDuration,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::NumberOfRiders => "Number_of_Riders",
            Self::NumberOfDrivers => "Number_of_Drivers",
            Self::LocationCategory => "Location_Category",
            Self::CustomerLoyaltyStatus => "Customer_Loyalty_Status",
            Self::NumberOfPastRides => "Number_of_Past_Rides",
            Self::AverageRatings => "Average_Ratings",
            Self::TimeOfBooking => "Time_of_Booking",
            Self::VehicleType => "Vehicle_Type",
            Self::ExpectedRideDuration => "Expected_Ride_Duration",
        }
    }

    pub fn label(&self) -> String {
        self.name().replace('_', " ")
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::NumberOfRiders
                | Self::NumberOfDrivers
                | Self::NumberOfPastRides
                | Self::AverageRatings
                | Self::ExpectedRideDuration
        )
    }

    /// Allowed literals for a categorical field, empty for numeric ones.
    pub fn options(&self) -> Vec<&'static str> {
        match self {
            Self::LocationCategory => LocationCategory::ALL.iter().map(|v| v.as_str()).collect(),
            Self::CustomerLoyaltyStatus => LoyaltyStatus::ALL.iter().map(|v| v.as_str()).collect(),
            Self::TimeOfBooking => TimeOfBooking::ALL.iter().map(|v| v.as_str()).collect(),
            Self::VehicleType => VehicleType::ALL.iter().map(|v| v.as_str()).collect(),
            _ => vec![],
        }
    }
}

impl FromStr for Field {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|field| field.name() == s)
            .copied()
            .ok_or_else(|| invalid_input_error().with_detail(format!("unknown field '{}'", s)))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RideRequest {
    #[serde(rename = "Number_of_Riders")]
    pub number_of_riders: u32,
    #[serde(rename = "Number_of_Drivers")]
    pub number_of_drivers: u32,
    #[serde(rename = "Location_Category")]
    pub location_category: LocationCategory,
    #[serde(rename = "Customer_Loyalty_Status")]
    pub customer_loyalty_status: LoyaltyStatus,
    #[serde(rename = "Number_of_Past_Rides")]
    pub number_of_past_rides: u32,
    #[serde(rename = "Average_Ratings")]
    pub average_ratings: f64,
    #[serde(rename = "Time_of_Booking")]
    pub time_of_booking: TimeOfBooking,
    #[serde(rename = "Vehicle_Type")]
    pub vehicle_type: VehicleType,
    #[serde(rename = "Expected_Ride_Duration")]
    pub expected_ride_duration: f64,
}

impl RideRequest {
    /// Returns a copy with `field` replaced by the parsed `raw` value.
    pub fn with_field(&self, field: Field, raw: &str) -> Result<Self, Error> {
        let mut next = self.clone();

        match field {
            Field::NumberOfRiders => next.number_of_riders = parse_count(field, raw)?,
            Field::NumberOfDrivers => next.number_of_drivers = parse_count(field, raw)?,
            Field::NumberOfPastRides => next.number_of_past_rides = parse_count(field, raw)?,
            Field::AverageRatings => next.average_ratings = parse_rating(field, raw)?,
            Field::ExpectedRideDuration => next.expected_ride_duration = parse_number(field, raw)?,
            Field::LocationCategory => next.location_category = raw.parse()?,
            Field::CustomerLoyaltyStatus => next.customer_loyalty_status = raw.parse()?,
            Field::TimeOfBooking => next.time_of_booking = raw.parse()?,
            Field::VehicleType => next.vehicle_type = raw.parse()?,
        }

        Ok(next)
    }

    pub fn value(&self, field: Field) -> String {
        match field {
            Field::NumberOfRiders => self.number_of_riders.to_string(),
            Field::NumberOfDrivers => self.number_of_drivers.to_string(),
            Field::NumberOfPastRides => self.number_of_past_rides.to_string(),
            Field::AverageRatings => self.average_ratings.to_string(),
            Field::ExpectedRideDuration => self.expected_ride_duration.to_string(),
            Field::LocationCategory => self.location_category.to_string(),
            Field::CustomerLoyaltyStatus => self.customer_loyalty_status.to_string(),
            Field::TimeOfBooking => self.time_of_booking.to_string(),
            Field::VehicleType => self.vehicle_type.to_string(),
        }
    }
}

fn parse_number(field: Field, raw: &str) -> Result<f64, Error> {
    let value: f64 = raw.trim().parse().map_err(|_| {
        invalid_input_error().with_detail(format!("{} must be a number, got '{}'", field, raw))
    })?;

    if !value.is_finite() || value < 0.0 {
        return Err(invalid_input_error()
            .with_detail(format!("{} must be a non-negative number", field)));
    }

    Ok(value)
}

fn parse_count(field: Field, raw: &str) -> Result<u32, Error> {
    let value = parse_number(field, raw)?;

    if value.fract() != 0.0 || value > u32::MAX as f64 {
        return Err(invalid_input_error()
            .with_detail(format!("{} must be a whole number", field)));
    }

    Ok(value as u32)
}

// ratings move in steps of 0.1
fn parse_rating(field: Field, raw: &str) -> Result<f64, Error> {
    let value = parse_number(field, raw)?;
    let tenths = value * 10.0;

    if (tenths - tenths.round()).abs() > 1e-9 {
        return Err(invalid_input_error()
            .with_detail(format!("{} must be a multiple of 0.1", field)));
    }

    Ok(value)
}
