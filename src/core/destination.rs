use crate::domain::model::{Destination, Reservation};

const SOURCE_MARKER: &str = "input";
const DESTINATION_MARKER: &str = "output";

/// Output location for one reservation. A source bucket without `input` is
/// kept as-is.
pub fn resolve(source_bucket: &str, reservation: &Reservation) -> Destination {
    let bucket = source_bucket.replacen(SOURCE_MARKER, DESTINATION_MARKER, 1);
    Destination {
        bucket: format!("{}/{}", bucket, reservation.hotel_code),
        key: object_key(&reservation.booking_id),
    }
}

pub fn object_key(booking_id: &str) -> String {
    format!("reservation_{}.json", booking_id)
}
