use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::result::ProbeError;

pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    timeout: Duration,
) -> Result<T, ProbeError> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|err| ProbeError::from_reqwest(err, timeout))?;
    decode(response, timeout).await
}

pub(crate) async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
    client: &Client,
    url: &str,
    body: &B,
    timeout: Duration,
) -> Result<T, ProbeError> {
    let response = client
        .post(url)
        .timeout(timeout)
        .json(body)
        .send()
        .await
        .map_err(|err| ProbeError::from_reqwest(err, timeout))?;
    decode(response, timeout).await
}

async fn decode<T: DeserializeOwned>(
    response: reqwest::Response,
    timeout: Duration,
) -> Result<T, ProbeError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ProbeError::Status(status.as_u16()));
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|err| ProbeError::from_reqwest(err, timeout))?;
    serde_json::from_slice(&bytes).map_err(|err| ProbeError::Decode(err.to_string()))
}
