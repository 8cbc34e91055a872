//! Typed extraction of one reservation from the decoded tree.
//!
//! The input is always a single `<Reservation>` mapping. Enumerating the
//! `Reservations.Reservation` collection (which may be a lone mapping or a
//! sequence) is done by the batch orchestrator before calling
//! [`map_reservation`].

use crate::config::toml_config::CurrencyPolicy;
use crate::core::xml_tree::{XmlNode, TEXT_KEY};
use crate::domain::model::{Guest, GuestAddress, RateLine, Reservation, RoomOccupancy};
use crate::utils::error::{EtlError, Result};

/// A node together with the dotted path it was reached by, so every error
/// names the offending field.
#[derive(Debug, Clone)]
pub(crate) struct Field<'a> {
    node: &'a XmlNode,
    path: String,
}

impl<'a> Field<'a> {
    pub(crate) fn root(node: &'a XmlNode) -> Self {
        Self {
            node,
            path: String::new(),
        }
    }

    pub(crate) fn node(&self) -> &'a XmlNode {
        self.node
    }

    fn join(&self, name: &str) -> String {
        if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.path, name)
        }
    }

    fn wrong_type(&self, expected: &'static str) -> EtlError {
        EtlError::WrongType {
            path: if self.path.is_empty() {
                "<record>".to_string()
            } else {
                self.path.clone()
            },
            expected,
            found: self.node.kind(),
        }
    }

    pub(crate) fn element(self) -> Result<Self> {
        match self.node {
            XmlNode::Map(_) => Ok(self),
            _ => Err(self.wrong_type("element")),
        }
    }

    pub(crate) fn optional_child(&self, name: &str) -> Result<Option<Field<'a>>> {
        match self.node {
            XmlNode::Map(fields) => Ok(fields.get(name).map(|node| Field {
                node,
                path: self.join(name),
            })),
            _ => Err(self.wrong_type("element")),
        }
    }

    pub(crate) fn child(&self, name: &str) -> Result<Field<'a>> {
        self.optional_child(name)?
            .ok_or_else(|| EtlError::MissingField {
                path: self.join(name),
            })
    }

    /// Text content; an element carrying attributes yields its `$t` text.
    fn text(&self) -> Result<String> {
        match self.node {
            XmlNode::Text(text) => Ok(text.clone()),
            XmlNode::Map(fields) => match fields.get(TEXT_KEY) {
                Some(XmlNode::Text(text)) => Ok(text.clone()),
                _ => Err(self.wrong_type("text")),
            },
            XmlNode::List(_) => Err(self.wrong_type("text")),
        }
    }

    fn text_at(&self, name: &str) -> Result<String> {
        self.child(name)?.text()
    }

    fn non_empty_text_at(&self, name: &str) -> Result<String> {
        let value = self.text_at(name)?;
        if value.trim().is_empty() {
            return Err(EtlError::EmptyField {
                path: self.join(name),
            });
        }
        Ok(value)
    }

    fn integer_at(&self, name: &str) -> Result<u32> {
        let field = self.child(name)?;
        let raw = field.text()?;
        raw.trim()
            .parse::<u32>()
            .map_err(|_| EtlError::InvalidInteger {
                path: field.path.clone(),
                value: raw,
            })
    }

    /// Repeatable node as a sequence; items of a real list get `[i]` paths.
    pub(crate) fn items(&self) -> Vec<Field<'a>> {
        match self.node {
            XmlNode::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, node)| Field {
                    node,
                    path: format!("{}[{}]", self.path, i),
                })
                .collect(),
            node => vec![Field {
                node,
                path: self.path.clone(),
            }],
        }
    }
}

/// Map one `<Reservation>` mapping into a validated [`Reservation`].
pub fn map_reservation(node: &XmlNode, policy: CurrencyPolicy) -> Result<Reservation> {
    let record = Field::root(node).element()?;

    let booking_id = record.non_empty_text_at("ID")?;
    let hotel_code = record.non_empty_text_at("Hotel")?;
    let from_date = record.text_at("From")?;
    let to_date = record.text_at("To")?;

    let guest = map_guest(&record.child("Guest")?.element()?)?;

    let room_stay = single_room_stay(&record.child("RoomStays")?.element()?)?;
    let room = room_stay.child("Room")?.element()?;
    let room_code = room.text_at("ID")?;
    let occupancy_node = room.child("Occupancy")?.element()?;
    let occupancy = RoomOccupancy {
        adults: occupancy_node.integer_at("Adults")?,
        children: occupancy_node.integer_at("Children")?,
    };

    let rates_node = room_stay.child("Rates")?.element()?;
    let rate_code = rates_node.text_at("Plan")?;
    let rates = rates_node
        .child("Rate")?
        .items()
        .into_iter()
        .enumerate()
        .map(|(i, rate)| {
            // 第一筆決定幣別；要求一致時每筆都必須帶幣別
            let currency_required = i == 0 || policy == CurrencyPolicy::RequireUniform;
            map_rate_line(rate, currency_required)
        })
        .collect::<Result<Vec<_>>>()?;
    let (total_price, currency) = aggregate_rates(&rates, policy)?;

    let comments = map_comments(&record)?;

    Ok(Reservation {
        booking_id,
        hotel_code,
        from_date,
        to_date,
        room_code,
        rate_code,
        occupancy,
        guest,
        comments,
        rates,
        total_price,
        currency,
    })
}

fn map_guest(guest: &Field<'_>) -> Result<Guest> {
    let address = guest.child("Address")?.element()?;
    Ok(Guest {
        first_name: guest.text_at("FirstName")?,
        last_name: guest.text_at("LastName")?,
        address: GuestAddress {
            street: address.text_at("Street")?,
            city: address.text_at("City")?,
            country_code: address.text_at("CountryCode")?,
        },
    })
}

fn single_room_stay<'a>(room_stays: &Field<'a>) -> Result<Field<'a>> {
    let mut stays = room_stays.child("RoomStay")?.items();
    if stays.len() != 1 {
        return Err(EtlError::MultipleRoomStays { count: stays.len() });
    }
    stays.remove(0).element()
}

fn map_rate_line(rate: Field<'_>, currency_required: bool) -> Result<RateLine> {
    let rate = rate.element()?;
    let currency = if currency_required {
        Some(rate.text_at("Currency")?)
    } else {
        rate.optional_child("Currency")?
            .map(|currency| currency.text())
            .transpose()?
    };

    Ok(RateLine {
        amount: parse_amount(&rate.text_at("Amount")?)?,
        currency,
    })
}

// 備註欄位是可選的，結構不符時記錄警告而不讓整筆失敗
fn map_comments(record: &Field<'_>) -> Result<Option<String>> {
    let Some(comments) = record.optional_child("Comments")? else {
        return Ok(None);
    };

    match comments.text() {
        Ok(text) => Ok(Some(text)),
        Err(e) => {
            tracing::warn!("Ignoring unreadable comments: {}", e);
            Ok(None)
        }
    }
}

/// Parse a non-negative amount; fractional digits are truncated.
pub fn parse_amount(raw: &str) -> Result<u64> {
    let invalid = || EtlError::InvalidAmount {
        value: raw.to_string(),
    };

    let trimmed = raw.trim();
    let (whole, fraction) = match trimmed.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (trimmed, None),
    };

    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(whole) || !fraction.map_or(true, digits) {
        return Err(invalid());
    }

    whole.parse::<u64>().map_err(|_| invalid())
}

/// `(sum of amounts, currency of the first line)`.
pub fn aggregate_rates(rates: &[RateLine], policy: CurrencyPolicy) -> Result<(u64, String)> {
    let first = rates.first().ok_or_else(|| EtlError::MissingField {
        path: "RoomStays.RoomStay.Rates.Rate".to_string(),
    })?;
    let currency = first.currency.clone().ok_or_else(|| EtlError::MissingField {
        path: "RoomStays.RoomStay.Rates.Rate.Currency".to_string(),
    })?;

    if policy == CurrencyPolicy::RequireUniform {
        if let Some(other) = rates
            .iter()
            .find(|r| r.currency.as_deref() != Some(currency.as_str()))
        {
            return Err(EtlError::CurrencyMismatch {
                expected: currency,
                found: other.currency.clone().unwrap_or_default(),
            });
        }
    }

    let total = rates
        .iter()
        .try_fold(0u64, |sum, rate| sum.checked_add(rate.amount))
        .ok_or_else(|| EtlError::InvalidAmount {
            value: format!(
                "sum overflow: {}",
                rates
                    .iter()
                    .map(|r| r.amount.to_string())
                    .collect::<Vec<_>>()
                    .join(" + ")
            ),
        })?;

    Ok((total, currency))
}
