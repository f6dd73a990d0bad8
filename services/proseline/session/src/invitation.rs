//! Invitation profile: plaintext exchange of self-signed invitations and
//! invitation requests, used once per new collaborator.

use proseline_crypto::SessionCipher;
use proseline_schema::{Invitation, Request, Schema};
use proseline_wire::TaggedMessage;
use serde_json::Value;

use crate::error::{Rejection, SessionError};
use crate::profile::{tagged, Profile};
use crate::session::Session;
use crate::transport::SessionStream;

/// Tag of invitation messages
pub const INVITATION_TAG: u64 = 1;
/// Tag of request messages
pub const REQUEST_TAG: u64 = 2;

/// Messages of the invitation profile
#[derive(Debug, Clone, PartialEq)]
pub enum InviteMessage {
    /// Project secrets for a new collaborator
    Invitation(Invitation),
    /// Request to be invited
    Request(Request),
}

/// Invitation profile. Needs no key: frames travel in the clear.
#[derive(Debug, Default, Clone, Copy)]
pub struct InvitationProfile;

impl Profile for InvitationProfile {
    type Message = InviteMessage;

    const NAME: &'static str = "invitation";
    const VERSION: u64 = 1;

    fn is_known(tag: u64) -> bool {
        matches!(tag, INVITATION_TAG | REQUEST_TAG)
    }

    fn cipher(&self) -> Option<&SessionCipher> {
        None
    }

    fn encode(&self, message: &InviteMessage) -> Result<TaggedMessage, Rejection> {
        match message {
            InviteMessage::Invitation(invitation) => {
                invitation.verify().map_err(Rejection::Signature)?;
                Ok(tagged(INVITATION_TAG, invitation)?)
            }
            InviteMessage::Request(request) => {
                request.verify().map_err(Rejection::Signature)?;
                Ok(tagged(REQUEST_TAG, request)?)
            }
        }
    }

    fn accept(&self, tag: u64, body: &Value) -> Result<InviteMessage, Rejection> {
        if tag == INVITATION_TAG {
            let invitation = Invitation::parse(body)?;
            invitation.verify().map_err(Rejection::Signature)?;
            Ok(InviteMessage::Invitation(invitation))
        } else {
            let request = Request::parse(body)?;
            request.verify().map_err(Rejection::Signature)?;
            Ok(InviteMessage::Request(request))
        }
    }
}

impl<S: SessionStream> Session<InvitationProfile, S> {
    /// Send an invitation
    pub async fn invitation(&mut self, invitation: Invitation) -> Result<(), SessionError> {
        self.send(InviteMessage::Invitation(invitation)).await
    }

    /// Ask the peer for an invitation
    pub async fn request(&mut self, request: Request) -> Result<(), SessionError> {
        self.send(InviteMessage::Request(request)).await
    }
}
