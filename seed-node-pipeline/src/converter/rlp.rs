use alloy_rlp::Header;

use crate::errors::DecodeError;

/// Splits an RLP list into the raw encodings of its items.
pub(crate) fn list_items<'a>(
    mut buf: &'a [u8],
    what: &'static str,
) -> Result<Vec<&'a [u8]>, DecodeError> {
    let header = Header::decode(&mut buf)?;
    if !header.list {
        return Err(DecodeError::ExpectedList(what));
    }
    if buf.len() < header.payload_length {
        return Err(alloy_rlp::Error::InputTooShort.into());
    }

    let mut payload = &buf[..header.payload_length];
    let mut items = Vec::new();
    while !payload.is_empty() {
        let mut rest = payload;
        let item = Header::decode(&mut rest)?;
        // single bytes below 0x80 are their own payload and are not consumed
        let consumed = payload.len() - rest.len() + item.payload_length;
        if consumed > payload.len() {
            return Err(alloy_rlp::Error::InputTooShort.into());
        }
        items.push(&payload[..consumed]);
        payload = &payload[consumed..];
    }
    Ok(items)
}

/// Wraps an already-encoded list payload in a list header.
pub(crate) fn wrap_list(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 9);
    Header {
        list: true,
        payload_length: payload.len(),
    }
    .encode(&mut out);
    out.extend_from_slice(payload);
    out
}

/// True when `item` is an RLP list rather than a string.
pub(crate) fn is_list(item: &[u8]) -> bool {
    item.first().is_some_and(|b| *b >= alloy_rlp::EMPTY_LIST_CODE)
}

#[cfg(test)]
mod tests {
    use alloy_rlp::Encodable;

    use super::*;

    #[test]
    fn test_list_items_keeps_raw_encodings() {
        let mut payload = Vec::new();
        1u64.encode(&mut payload);
        1024u64.encode(&mut payload);
        "dog".encode(&mut payload);
        let inner = wrap_list(&[0x80]);
        payload.extend_from_slice(&inner);
        let list = wrap_list(&payload);

        let items = list_items(&list, "test").unwrap();

        assert_eq!(items.len(), 4);
        assert_eq!(items[0], &[0x01]);
        assert_eq!(items[1], &[0x82, 0x04, 0x00]);
        assert_eq!(items[2], &[0x83, b'd', b'o', b'g']);
        assert_eq!(items[3], inner.as_slice());
        assert!(is_list(items[3]));
        assert!(!is_list(items[2]));
    }

    #[test]
    fn test_list_items_rejects_string() {
        let mut buf = Vec::new();
        "dog".encode(&mut buf);
        assert!(matches!(
            list_items(&buf, "block"),
            Err(DecodeError::ExpectedList("block"))
        ));
    }

    #[test]
    fn test_list_items_rejects_truncated_input() {
        let list = wrap_list(&[0x83, b'd', b'o', b'g']);
        assert!(list_items(&list[..list.len() - 1], "block").is_err());
    }
}
