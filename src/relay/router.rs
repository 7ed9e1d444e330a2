use super::{ChannelHandle, Incoming, Relay, RelayError};

impl Relay {
    /// Parse one inbound frame from `handle` and dispatch it.
    ///
    /// Errors describe an envelope that was dropped. The channel itself stays
    /// usable whatever is returned.
    pub fn route(&self, handle: &ChannelHandle, raw: &str) -> Result<(), RelayError> {
        let conn = self
            .connections
            .lookup_by_channel(handle)
            .ok_or(RelayError::UnknownConnection)?;

        match Incoming::parse(raw)? {
            Incoming::JoinRoom { room_id, user_name } => {
                self.join(&conn.identity, room_id, user_name)
            }
            Incoming::LeaveRoom { room_id } => {
                self.leave(&conn.identity, &room_id);
                Ok(())
            }
            Incoming::Signal { to, signal } => {
                self.relay_signal(&conn.identity, &to, signal);
                Ok(())
            }
            Incoming::Chat { room_id, text } => self.chat(&conn.identity, &room_id, text),
            Incoming::UserInfo { user_name } => {
                self.rename(&conn.identity, user_name);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use tokio::sync::mpsc;

    use super::*;
    use crate::relay::Outbound;

    fn connect(relay: &Relay) -> (ChannelHandle, mpsc::Receiver<Outbound>) {
        let (handle, rx) = ChannelHandle::new(16);
        relay.on_open(handle.clone());
        (handle, rx)
    }

    fn next(rx: &mut mpsc::Receiver<Outbound>) -> Value {
        serde_json::from_str(&rx.try_recv().unwrap()).unwrap()
    }

    #[test]
    fn routes_join_chat_and_leave() {
        let relay = Relay::default();
        let (a, mut rx_a) = connect(&relay);
        let (b, mut rx_b) = connect(&relay);

        relay
            .route(&a, r#"{"type":"join-room","roomId":"r1","userName":"Alice"}"#)
            .unwrap();
        relay
            .route(&b, r#"{"type":"join-room","roomId":"r1","userName":"Bob"}"#)
            .unwrap();
        assert_eq!(next(&mut rx_a)["type"], "room-joined");
        assert_eq!(next(&mut rx_a)["type"], "user-joined");
        assert_eq!(next(&mut rx_b)["type"], "room-joined");

        relay.route(&b, r#"{"type":"chat","roomId":"r1","text":"yo"}"#).unwrap();
        assert_eq!(next(&mut rx_a)["message"]["text"], "yo");
        assert_eq!(next(&mut rx_b)["message"]["text"], "yo");

        relay.route(&b, r#"{"type":"leave-room","roomId":"r1"}"#).unwrap();
        assert_eq!(next(&mut rx_a)["type"], "user-left");
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn routes_signal_by_identity() {
        let relay = Relay::default();
        let (a, _rx_a) = connect(&relay);
        let (b, mut rx_b) = connect(&relay);
        let a_id = relay.connections.lookup_by_channel(&a).unwrap().identity;
        let b_id = relay.connections.lookup_by_channel(&b).unwrap().identity;

        let raw = format!(r#"{{"type":"signal","to":"{b_id}","signal":{{"candidate":"c1"}}}}"#);
        relay.route(&a, &raw).unwrap();

        let msg = next(&mut rx_b);
        assert_eq!(msg["type"], "signal");
        assert_eq!(msg["from"], a_id.as_str());
        assert_eq!(msg["signal"]["candidate"], "c1");
    }

    #[test]
    fn bad_frames_are_dropped_and_channel_keeps_working() {
        let relay = Relay::default();
        let (a, mut rx_a) = connect(&relay);

        assert!(matches!(relay.route(&a, "{oops"), Err(RelayError::MalformedMessage(_))));
        assert!(matches!(
            relay.route(&a, r#"{"type":"wave"}"#),
            Err(RelayError::UnknownMessageType(kind)) if kind == "wave"
        ));
        assert!(relay.route(&a, r#"{"type":"signal","to":"ghost","signal":1}"#).is_ok());

        relay
            .route(&a, r#"{"type":"join-room","roomId":"r","userName":"Alice"}"#)
            .unwrap();
        assert_eq!(next(&mut rx_a)["type"], "room-joined");
    }

    #[test]
    fn frames_from_closed_channels_are_rejected() {
        let relay = Relay::default();
        let (a, _rx_a) = connect(&relay);
        relay.on_close(&a);

        assert!(matches!(
            relay.route(&a, r#"{"type":"leave-room","roomId":"r"}"#),
            Err(RelayError::UnknownConnection)
        ));
    }
}
