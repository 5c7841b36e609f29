//! Event-based XML output for collection files.

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use rust_decimal::{Decimal, RoundingStrategy};
use std::io::Cursor;

use crate::core::IncassoError;

pub type XmlResult = Result<String, IncassoError>;

/// Format a Decimal for message output — exactly 2 decimal places, as the
/// control sums and instructed amounts of a collection always carry cents.
/// Sub-cent amounts round half away from zero.
pub fn format_amount(d: Decimal) -> String {
    format!(
        "{:.2}",
        d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}

/// Indented writer over quick-xml events. All text content passes through
/// quick-xml's escaping.
pub struct XmlWriter {
    inner: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    pub fn new() -> Result<Self, IncassoError> {
        let mut w = Self {
            inner: Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2),
        };
        w.emit(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        Ok(w)
    }

    fn emit(&mut self, event: Event<'_>) -> Result<(), IncassoError> {
        self.inner
            .write_event(event)
            .map_err(|e| IncassoError::Xml(format!("XML write error: {e}")))
    }

    pub fn into_string(self) -> XmlResult {
        String::from_utf8(self.inner.into_inner().into_inner())
            .map_err(|e| IncassoError::Xml(format!("XML UTF-8 error: {e}")))
    }

    pub fn start_element(&mut self, name: &str) -> Result<(), IncassoError> {
        self.emit(Event::Start(BytesStart::new(name)))
    }

    pub fn start_element_with_attrs(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
    ) -> Result<(), IncassoError> {
        let mut elem = BytesStart::new(name);
        for (key, value) in attrs {
            elem.push_attribute((*key, *value));
        }
        self.emit(Event::Start(elem))
    }

    pub fn end_element(&mut self, name: &str) -> Result<(), IncassoError> {
        self.emit(Event::End(BytesEnd::new(name)))
    }

    pub fn text_element(&mut self, name: &str, text: &str) -> Result<(), IncassoError> {
        self.start_element(name)?;
        self.emit(Event::Text(BytesText::new(text)))?;
        self.end_element(name)
    }

    /// A leaf element with a currency attribute
    /// (e.g. `<InstdAmt Ccy="EUR">150.00</InstdAmt>`).
    pub fn amount_element(
        &mut self,
        name: &str,
        amount: Decimal,
        currency: &str,
    ) -> Result<(), IncassoError> {
        self.start_element_with_attrs(name, &[("Ccy", currency)])?;
        self.emit(Event::Text(BytesText::new(&format_amount(amount))))?;
        self.end_element(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn format_amount_cases() {
        assert_eq!(format_amount(dec!(100)), "100.00");
        assert_eq!(format_amount(dec!(150.5)), "150.50");
        assert_eq!(format_amount(dec!(49.90)), "49.90");
        assert_eq!(format_amount(dec!(0.005)), "0.01");
        assert_eq!(format_amount(dec!(0.015)), "0.02");
        assert_eq!(format_amount(dec!(2.675)), "2.68");
        assert_eq!(format_amount(dec!(1234.567)), "1234.57");
    }

    #[test]
    fn writer_escapes_text() {
        let mut w = XmlWriter::new().unwrap();
        w.start_element("Doc").unwrap();
        w.text_element("Nm", "A & B <C>").unwrap();
        w.end_element("Doc").unwrap();
        let xml = w.into_string().unwrap();
        assert!(xml.contains("A &amp; B &lt;C&gt;"));
    }

    #[test]
    fn writer_indents_and_declares() {
        let mut w = XmlWriter::new().unwrap();
        w.start_element("Document").unwrap();
        w.text_element("MsgId", "X-1").unwrap();
        w.end_element("Document").unwrap();
        let xml = w.into_string().unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("\n  <MsgId>X-1</MsgId>"));
    }
}
